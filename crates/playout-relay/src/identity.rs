//! Artifact identity: every key an invocation touches, derived from the
//! artifact name alone.
//!
//! The derivation is pure, so a retry of the same request lands on the same
//! archive and destination keys and looks for the same completion marker.

use playout_core::config::RelayConfig;

use crate::request::SOURCE_EXTENSION;

/// Extension of the transformed artifact.
pub const OUTPUT_EXTENSION: &str = ".json";

/// Suffix appended to the output name to form the completion marker prefix.
pub const MARKER_SUFFIX: &str = ".done";

/// Prefix layout of the stores the relay touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    /// Prefix new artifacts arrive under (primary store).
    pub ingest_prefix: String,
    /// Prefix transformed artifacts are archived under (primary store).
    pub archive_prefix: String,
    /// Base prefix of destination uploads (destination store).
    pub destination_prefix_base: String,
    /// Base prefix completion markers appear under (destination store).
    pub done_prefix_base: String,
}

impl KeyLayout {
    /// Extracts the layout from the relay configuration.
    #[must_use]
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            ingest_prefix: config.ingest_prefix.clone(),
            archive_prefix: config.archive_prefix.clone(),
            destination_prefix_base: config.destination_prefix_base.clone(),
            done_prefix_base: config.done_prefix_base.clone(),
        }
    }
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self {
            ingest_prefix: "tx-schedules/incoming".into(),
            archive_prefix: "tx-schedules/archive".into(),
            destination_prefix_base: "rt-demo/schedules".into(),
            done_prefix_base: "rt-demo/procschedules".into(),
        }
    }
}

/// Keys derived for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactIdentity {
    /// Source key in the primary store.
    pub source_key: String,
    /// Archived copy key in the primary store.
    pub archive_key: String,
    /// Upload key in the destination store.
    pub destination_key: String,
    /// Prefix listed when polling for the completion marker.
    pub done_prefix: String,
    /// Basename prefix a completion marker must start with.
    pub marker_prefix: String,
    /// Done path relative to the destination's top-level folder, reported to callers.
    pub processed_path: String,
}

impl ArtifactIdentity {
    /// Derives every key for `file_name`.
    ///
    /// Returns `None` when `file_name` does not end in `.xml`.
    #[must_use]
    pub fn derive(
        layout: &KeyLayout,
        file_name: &str,
        vipe_channel_id: &str,
        channel: &str,
    ) -> Option<Self> {
        let output_name = output_name(file_name)?;
        let done_leaf = layout
            .done_prefix_base
            .rsplit('/')
            .next()
            .unwrap_or(&layout.done_prefix_base);

        Some(Self {
            source_key: format!("{}/{file_name}", layout.ingest_prefix),
            archive_key: format!("{}/{output_name}", layout.archive_prefix),
            destination_key: format!(
                "{}/{vipe_channel_id}/{output_name}",
                layout.destination_prefix_base
            ),
            done_prefix: format!("{}/{channel}/done/", layout.done_prefix_base),
            marker_prefix: format!("{output_name}{MARKER_SUFFIX}"),
            processed_path: format!("{done_leaf}/{channel}/done/"),
        })
    }
}

/// Maps an artifact name to the name of its transformed output.
#[must_use]
pub fn output_name(file_name: &str) -> Option<String> {
    file_name
        .strip_suffix(SOURCE_EXTENSION)
        .map(|stem| format!("{stem}{OUTPUT_EXTENSION}"))
}

/// Recovers the artifact name from an archive or destination key.
#[must_use]
pub fn source_name_from_key(key: &str) -> Option<String> {
    let basename = key.rsplit('/').next().unwrap_or(key);
    basename
        .strip_suffix(OUTPUT_EXTENSION)
        .map(|stem| format!("{stem}{SOURCE_EXTENSION}"))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::request::InvocationEvent;

    fn identity(file_name: &str) -> ArtifactIdentity {
        ArtifactIdentity::derive(&KeyLayout::default(), file_name, "ARQTV3", "ARQTV3").unwrap()
    }

    #[test]
    fn derives_bit_exact_keys() {
        let id = identity("SCH_HHUN_20250515.xml");
        assert_eq!(id.source_key, "tx-schedules/incoming/SCH_HHUN_20250515.xml");
        assert_eq!(id.archive_key, "tx-schedules/archive/SCH_HHUN_20250515.json");
        assert_eq!(
            id.destination_key,
            "rt-demo/schedules/ARQTV3/SCH_HHUN_20250515.json"
        );
        assert_eq!(id.done_prefix, "rt-demo/procschedules/ARQTV3/done/");
        assert_eq!(id.marker_prefix, "SCH_HHUN_20250515.json.done");
        assert_eq!(id.processed_path, "procschedules/ARQTV3/done/");
    }

    #[test]
    fn derivation_is_invertible() {
        for name in ["SCH_HHUN_20250515.xml", "a.xml.xml", "with.dots.in.name.xml"] {
            let id = identity(name);
            assert_eq!(source_name_from_key(&id.archive_key).as_deref(), Some(name));
            assert_eq!(source_name_from_key(&id.destination_key).as_deref(), Some(name));
        }
    }

    #[test]
    fn derivation_is_stable() {
        assert_eq!(identity("SCH.xml"), identity("SCH.xml"));
    }

    #[test]
    fn only_xml_names_derive() {
        assert!(ArtifactIdentity::derive(&KeyLayout::default(), "SCH.json", "A", "A").is_none());
        assert_eq!(output_name("x.xml").as_deref(), Some("x.json"));
    }

    fn valid_file_name() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_. -]{0,40}(\\.xml)?".prop_map(|stem| format!("{stem}.xml"))
    }

    proptest! {
        #[test]
        fn every_valid_name_round_trips(
            file_name in valid_file_name(),
            channel in "[A-Z0-9]{1,8}",
        ) {
            let event = InvocationEvent {
                file_name: Some(file_name.clone()),
                vipe_channel_id: Some(channel.clone()),
                ..InvocationEvent::default()
            };
            prop_assume!(event.validate().is_ok());

            let id = ArtifactIdentity::derive(&KeyLayout::default(), &file_name, &channel, &channel)
                .unwrap();
            prop_assert_eq!(source_name_from_key(&id.archive_key), Some(file_name.clone()));
            prop_assert_eq!(source_name_from_key(&id.destination_key), Some(file_name.clone()));
            prop_assert!(id.marker_prefix.starts_with(&output_name(&file_name).unwrap()));
        }
    }

    #[test]
    fn done_prefix_uses_marker_channel() {
        let id =
            ArtifactIdentity::derive(&KeyLayout::default(), "SCH.xml", "ARQTV3", "HHUN").unwrap();
        assert_eq!(id.destination_key, "rt-demo/schedules/ARQTV3/SCH.json");
        assert_eq!(id.done_prefix, "rt-demo/procschedules/HHUN/done/");
    }
}
