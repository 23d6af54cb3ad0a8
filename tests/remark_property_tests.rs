// Property-based tests for the remark workflow
// Arbitrary transition sequences must keep the history append-only and the
// terminal lock absolute for actors without override.

mod fixtures;

use proptest::prelude::*;
use std::sync::Arc;

use dashboard_remarks::access::OpenPolicy;
use dashboard_remarks::store::InMemoryRepository;
use dashboard_remarks::workflows::{StageCatalog, WorkflowError};
use dashboard_remarks::Actor;
use fixtures::engine_with;

const LABELS: [&str; 8] = [
    "NEW",
    "CONTACTED",
    "QUALIFIED",
    "PROPOSAL_SENT",
    "NEGOTIATION",
    "WON",
    "LOST",
    "CLOSED",
];

fn transition_strategy() -> impl Strategy<Value = Vec<(usize, String)>> {
    prop::collection::vec((0usize..LABELS.len(), "[a-z ]{0,24}"), 1..25)
}

proptest! {
    #[test]
    fn history_grows_by_one_per_success_until_terminal(
        steps in transition_strategy(),
        allow_override in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let catalog = StageCatalog::default();
            let engine = engine_with(
                Arc::new(OpenPolicy::new(allow_override)),
                Arc::new(InMemoryRepository::new()),
            );
            let actor = Actor::new("prop");
            let mut expected_len = 0usize;
            let mut locked = false;

            for (index, text) in &steps {
                let result = engine.apply_transition(1, LABELS[*index], text, &actor).await;
                if locked && !allow_override {
                    prop_assert!(matches!(result, Err(WorkflowError::InvalidTransition { .. })), "expected InvalidTransition");
                } else {
                    let remark = result.unwrap();
                    expected_len += 1;
                    prop_assert_eq!(remark.history().len(), expected_len);
                    prop_assert_eq!(remark.stage().label(), LABELS[*index]);
                    prop_assert_eq!(remark.text(), text.as_str());
                    locked = catalog.is_terminal(remark.stage());
                }

                let history = engine.get_history(1).await.unwrap();
                prop_assert_eq!(history.len(), expected_len);
            }
            Ok(())
        })?;
    }
}
