use anyhow::Result;
use std::sync::Arc;

use super::{with_services, Command};
use crate::access::{Actor, OpenPolicy};
use crate::cli::RemarkAction;
use crate::config::DashboardConfig;
use crate::workflows::{History, Remark};

pub struct RemarkCommand {
    config: DashboardConfig,
    action: RemarkAction,
}

impl RemarkCommand {
    pub fn new(config: DashboardConfig, action: RemarkAction) -> Self {
        Self { config, action }
    }
}

impl Command for RemarkCommand {
    async fn execute(&self) -> Result<()> {
        // Local operation: whoever runs the binary may transition.
        let force = matches!(self.action, RemarkAction::Set { force: true, .. });
        let policy = Arc::new(OpenPolicy::new(force));

        with_services(&self.config, policy, |services| async move {
            let engine = services.engine;
            match &self.action {
                RemarkAction::Show { record_id } => {
                    let remark = engine.get_current_state(*record_id).await?;
                    print_remark(&remark);
                }
                RemarkAction::Set {
                    record_id,
                    stage,
                    text,
                    actor,
                    ..
                } => {
                    let remark = engine
                        .apply_transition(*record_id, stage, text, &Actor::new(actor.as_str()))
                        .await?;
                    println!("✅ Record #{} moved to {}", record_id, remark.stage());
                    print_remark(&remark);
                }
                RemarkAction::History { record_id } => {
                    let history = engine.get_history(*record_id).await?;
                    print_history(*record_id, &history);
                }
            }
            Ok(())
        })
        .await
    }
}

fn print_remark(remark: &Remark) {
    println!("📋 Record #{}", remark.record_id());
    println!("   🏷️  Stage: {}", remark.stage());
    println!("   📝 Text: {}", remark.text());
    if let (Some(at), Some(by)) = (remark.updated_at(), remark.updated_by()) {
        println!("   🕒 Updated {} by {}", at.to_rfc3339(), by);
    }
    println!("   🔢 Version: {}", remark.version());
}

fn print_history(record_id: u64, history: &History) {
    if history.is_empty() {
        println!("📜 Record #{record_id} has no remark history");
        return;
    }
    println!("📜 History for record #{record_id}:");
    for (index, entry) in history.iter().enumerate() {
        println!(
            "  {}. {} {:<14} {} - {}",
            index + 1,
            entry.timestamp.to_rfc3339(),
            entry.stage.label(),
            entry.actor,
            entry.text
        );
    }
}
