//! Scenario-level integration tests (§8) against the public `Controller` API,
//! using the deterministic fixture boards in `nana_mcts::fixtures` rather
//! than a real falling-block engine (out of scope, §1).

use std::time::Duration;

use nana_mcts::fixtures::ShimGame;
use nana_mcts::{Controller, SearchStyle};

/// S1: single core, short search, deterministic best move and a bounded
/// reward.
#[test]
fn single_core_short_search_produces_bounded_reward() {
    let mut controller: Controller<ShimGame> = Controller::new(SearchStyle::Nana);
    controller.start_search(ShimGame::test_case(0), 1);
    std::thread::sleep(Duration::from_millis(100));
    controller.end_search();

    let stats = controller.statistics();
    assert!(stats.nodes > 0);

    let reward = controller.best_reward();
    assert!(reward >= 0.0 && reward <= 1.0);

    let _ = controller.best_move();
}

/// S2: four cores for a short search must join cleanly and out-produce a
/// single core run over a comparable budget.
#[test]
fn multi_core_search_joins_without_deadlock_and_outpaces_single_core() {
    let mut single: Controller<ShimGame> = Controller::new(SearchStyle::Nana);
    single.start_search(ShimGame::test_case(0), 1);
    std::thread::sleep(Duration::from_millis(150));
    single.end_search();
    let single_nodes = single.statistics().nodes;

    let mut quad: Controller<ShimGame> = Controller::new(SearchStyle::Nana);
    quad.start_search(ShimGame::test_case(0), 4);
    std::thread::sleep(Duration::from_millis(150));
    quad.end_search();
    let quad_nodes = quad.statistics().nodes;

    assert!(quad_nodes >= single_nodes, "four workers should not visit fewer nodes than one in the same budget");
}

/// S3: a terminal root means every traversal is a zero-reward rollout of the
/// root itself; node count should stay near the seeded root, not grow.
#[test]
fn terminal_root_state_produces_minimal_growth() {
    let mut controller: Controller<ShimGame> = Controller::new(SearchStyle::Cc);
    controller.start_search(ShimGame::terminal_case(), 2);
    std::thread::sleep(Duration::from_millis(50));
    controller.end_search();

    let stats = controller.statistics();
    // every select on a terminal root short-circuits to a rollout with an
    // empty path, which is dropped (§4.6/§7) rather than growing the tree.
    assert!(stats.nodes < 1000, "terminal root should not produce runaway node growth");

    let _ = controller.best_move();
}

/// S6: the tree must survive a `continue_search`, and both phases report
/// forward progress.
#[test]
fn continue_search_preserves_tree_across_phases() {
    let mut controller: Controller<ShimGame> = Controller::new(SearchStyle::Nana);
    controller.start_search(ShimGame::test_case(1), 2);
    std::thread::sleep(Duration::from_millis(80));
    controller.end_search();
    let nodes_after_first = controller.statistics().nodes;

    controller.continue_search(ShimGame::test_case(1));
    std::thread::sleep(Duration::from_millis(80));
    controller.end_search();
    let nodes_after_second = controller.statistics().nodes;

    assert!(nodes_after_second >= nodes_after_first);
}

/// Property 7: `time_ms = 0` exits cleanly and leaves at least the root node.
#[test]
fn zero_duration_search_exits_cleanly_with_root_present() {
    let mut controller: Controller<ShimGame> = Controller::new(SearchStyle::Nana);
    controller.start_search(ShimGame::test_case(0), 3);
    controller.end_search();

    let _ = controller.best_move();
}
