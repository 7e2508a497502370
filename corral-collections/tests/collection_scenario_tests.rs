use serial_test::serial;

use corral_collections::common_tests::collection_scenarios::*;

#[test]
#[serial]
fn scenario_reader_holds_while_remover_removes() {
    scenario_concurrent_reader_and_remover();
}

#[test]
#[serial]
fn scenario_reader_blocks_behind_writer() {
    scenario_writer_blocks_reader();
}

#[test]
fn scenario_traversal_skips_concurrent_removal() {
    scenario_traversal_across_removal();
}

#[test]
fn scenario_traversal_ends_when_tail_removed() {
    scenario_traversal_into_fully_removed_tail();
}

#[test]
fn scenario_dictionary_key_replacement() {
    scenario_dictionary_replacement();
}

#[test]
fn scenario_tombstoned_reference_fails_upgrade() {
    scenario_reference_survives_tombstone();
}

#[test]
#[serial]
fn scenario_teardown_waits_for_holders() {
    scenario_destructor_drains_pending();
}
