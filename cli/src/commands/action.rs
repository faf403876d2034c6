use colored::*;
use doorlink_common::config::Config;
use doorlink_core::actions::DoorAction;
use doorlink_core::controller::{DoorbellController, LifecycleEvent};
use doorlink_core::executor::CommandResult;
use tracing::{Instrument, warn};

use crate::commands::build_controller;
use crate::terminal::print;
use crate::terminal::spinner;

pub async fn perform(action: DoorAction, cfg: &Config, q_level: u8) -> anyhow::Result<()> {
    let controller = build_controller(cfg)?;
    let span = spinner::start("action", &format!("Running {action}..."));

    let outcome = controller.perform(action).instrument(span).await;
    finish(&controller, &action.to_string(), outcome, q_level).await
}

pub async fn exec(role: &str, command: &[String], cfg: &Config, q_level: u8) -> anyhow::Result<()> {
    let controller = build_controller(cfg)?;
    let command: String = command.join(" ");
    let span = spinner::start("exec", &format!("Running '{command}' on {role}..."));

    let outcome = controller.exec(role, &command).instrument(span).await;
    finish(&controller, &format!("{role} command"), outcome, q_level).await
}

async fn finish(
    controller: &DoorbellController,
    label: &str,
    outcome: doorlink_common::Result<CommandResult>,
    q_level: u8,
) -> anyhow::Result<()> {
    controller.handle_lifecycle(LifecycleEvent::Destroy).await;
    let result: CommandResult = outcome?;

    report(label, &result, q_level);
    if !result.is_success() {
        anyhow::bail!("{label} failed: {}", result.output);
    }
    Ok(())
}

fn report(label: &str, result: &CommandResult, q_level: u8) {
    print::header(label, q_level);

    let status: ColoredString = match result.is_success() {
        true => result.status.to_string().green().bold(),
        false => result.status.to_string().red().bold(),
    };
    print::field("Status", status);
    if let Some(code) = result.exit_status {
        print::field("Exit code", code);
    }

    if result.is_success() {
        for line in result.output.lines() {
            print::print(line);
        }
    }
    for line in result.stderr.lines() {
        warn!("{line}");
    }
}
