//! Property test for the no-deletion-of-referenced invariant: whatever
//! the registry believes, a key with a committed DB row survives the
//! cycle.

mod common;

use std::collections::HashSet;

use proptest::prelude::*;

use s3gc_core::models::GcMode;

use common::{avatar_column, days_ago, fixture};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_referenced_keys_survive_execute(
        // Keys 0..n, an arbitrary referenced subset, and arbitrary
        // (possibly wrong) registry counts.
        n in 1usize..12,
        referenced_bits in any::<u16>(),
        counted_bits in any::<u16>(),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let fx = fixture(GcMode::Execute).await;
            let mut referenced = HashSet::new();

            for i in 0..n {
                let key = format!("objects/{i:02}.bin");
                fx.store.put_with_mtime(&key, vec![i as u8; 16], days_ago(30));
                if referenced_bits & (1 << i) != 0 {
                    fx.verifier.insert(avatar_column(), &key);
                    referenced.insert(key.clone());
                }
                // Registry may disagree with the database in either
                // direction.
                if counted_bits & (1 << i) != 0 {
                    fx.runtime.registry().increment(&key, &avatar_column()).unwrap();
                }
            }

            let report = fx.runtime.run_cycle(None).await.unwrap();

            for i in 0..n {
                let key = format!("objects/{i:02}.bin");
                if referenced.contains(&key) {
                    assert!(fx.store.contains(&key), "referenced {key} must survive");
                }
            }
            // Everything deleted was unreferenced and has a vault record.
            for orphan in &report.orphans {
                assert!(!referenced.contains(orphan));
                assert!(fx.runtime.vault().lookup_by_key(orphan).unwrap().is_some());
            }
        });
    }
}
