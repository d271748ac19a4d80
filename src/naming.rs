//! Map name and storage key assembly.
//!
//! Both functions are pure. Keys embed the client identity and the
//! partition index, so two clients (or two partitions of one client) never
//! address the same remote key.

use crate::config::RunnerConfig;
use crate::id::ClientIdentity;

/// Derive the name of a partition's map.
///
/// Order: optional prefix, base name, optional `-{partition}`, optional `-{client}`.
pub fn assemble_map_name(config: &RunnerConfig, partition: u16, client: &ClientIdentity) -> String {
    let mut map_name = config.map_base_name.clone();
    if config.use_map_prefix && !config.map_prefix.is_empty() {
        map_name = format!("{}{}", config.map_prefix, map_name);
    }
    if config.append_map_index_to_map_name {
        map_name = format!("{}-{}", map_name, partition);
    }
    if config.append_client_id_to_map_name {
        map_name = format!("{}-{}", map_name, client);
    }
    map_name
}

/// Derive the storage key of one element within one partition.
///
/// Format: `{client}-{partition}-{element_id}`
pub fn assemble_map_key(client: &ClientIdentity, partition: u16, element_id: &str) -> String {
    format!("{}-{}-{}", client, partition, element_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RunnerConfigBuilder, RunnerSection};
    use std::collections::HashSet;

    fn config(use_prefix: bool, prefix: &str, append_index: bool, append_client: bool) -> RunnerConfig {
        let mut config = RunnerConfigBuilder::new("map-tests.load", "load")
            .populate_config(&RunnerSection::default())
            .unwrap();
        config.use_map_prefix = use_prefix;
        config.map_prefix = prefix.to_string();
        config.append_map_index_to_map_name = append_index;
        config.append_client_id_to_map_name = append_client;
        config
    }

    fn client(id: &str) -> ClientIdentity {
        ClientIdentity::from_configured(id)
    }

    #[test]
    fn test_base_name_only() {
        let name = assemble_map_name(&config(false, "ht_", false, false), 3, &client("c1"));
        assert_eq!(name, "load");
    }

    #[test]
    fn test_all_options_applied_in_order() {
        let name = assemble_map_name(&config(true, "ht_", true, true), 3, &client("c1"));
        assert_eq!(name, "ht_load-3-c1");
    }

    #[test]
    fn test_empty_prefix_is_ignored() {
        let name = assemble_map_name(&config(true, "", true, false), 0, &client("c1"));
        assert_eq!(name, "load-0");
    }

    #[test]
    fn test_client_suffix_without_index() {
        let name = assemble_map_name(&config(false, "", false, true), 9, &client("c1"));
        assert_eq!(name, "load-c1");
    }

    #[test]
    fn test_map_name_is_deterministic() {
        let cfg = config(true, "p_", true, true);
        let c = client("c1");
        assert_eq!(assemble_map_name(&cfg, 1, &c), assemble_map_name(&cfg, 1, &c));
    }

    #[test]
    fn test_map_key_format() {
        assert_eq!(assemble_map_key(&client("c1"), 2, "17"), "c1-2-17");
    }

    #[test]
    fn test_map_keys_never_collide_across_partitions_and_clients() {
        let clients = [ClientIdentity::generate(), ClientIdentity::generate()];
        let mut seen = HashSet::new();
        for c in &clients {
            for partition in 0..20u16 {
                for element in 0..50 {
                    let key = assemble_map_key(c, partition, &element.to_string());
                    assert!(seen.insert(key), "duplicate key generated");
                }
            }
        }
        assert_eq!(seen.len(), 2 * 20 * 50);
    }
}
