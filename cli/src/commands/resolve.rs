use colored::*;
use doorlink_common::config::{ActionsConfig, Config, RemoteRole};
use doorlink_core::actions::DoorAction;
use tracing::Instrument;

use crate::commands::build_controller;
use crate::mprint;
use crate::terminal::{colors, print, spinner};

pub async fn resolve(cfg: &Config, q_level: u8) -> anyhow::Result<()> {
    let controller = build_controller(cfg)?;
    let span = spinner::start("resolve", "Looking for the doorbell devices...");

    let roles: Vec<RemoteRole> = controller.resolve_roles().instrument(span).await;

    print::header("roles", q_level);
    for (idx, role) in roles.iter().enumerate() {
        print::tree(idx, &role.name, &role_details(role, &cfg.actions));
        if idx + 1 != roles.len() {
            mprint!();
        }
    }

    if roles.iter().all(RemoteRole::is_unresolved) {
        print::no_results("devices");
    }
    Ok(())
}

fn role_details(role: &RemoteRole, actions: &ActionsConfig) -> Vec<(&'static str, ColoredString)> {
    let host: ColoredString = match role.host {
        Some(host) => host.to_string().color(colors::IPV4_ADDR),
        None => "unavailable".color(colors::UNAVAILABLE),
    };
    let enabled: Vec<String> = DoorAction::for_role(&role.name, actions)
        .iter()
        .map(DoorAction::to_string)
        .collect();
    let enabled: ColoredString = match (role.host, enabled.is_empty()) {
        (_, true) => "none".normal(),
        (Some(_), false) => enabled.join(", ").normal(),
        (None, false) => enabled.join(", ").color(colors::UNAVAILABLE).strikethrough(),
    };

    vec![
        ("User", role.credentials.username.normal()),
        ("Host", host),
        ("Actions", enabled),
    ]
}
