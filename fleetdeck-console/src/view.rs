//! Plain-text surfaces: the wizard view and the node overview.

use std::fmt::Write as _;

use crate::monitor::{HealthClass, NodeView};
use crate::poller::{PollPhase, PollProgress};
use crate::wizard::{blockers, build_config, step, FieldKind, Section, WizardState};

const PLACEHOLDER: &str = "--";

fn mark(ok: bool) -> &'static str {
    if ok {
        "✅"
    } else {
        "❌"
    }
}

pub fn render_wizard(state: &WizardState) -> String {
    let spec = step(state.step());
    let form = state.form();
    let mut out = String::new();

    let _ = writeln!(out, "Step {}/{} - {}", state.step(), state.total_steps(), spec.title);
    let _ = writeln!(out, "────────────────────────────────────────");

    for &field in spec.fields {
        if !form.is_visible(field) {
            continue;
        }
        let value = form.value(field);
        let shown = if value.is_empty() { "<empty>" } else { value };
        let _ = writeln!(out, "  {:<15} {}", field.as_str(), shown.replace('\n', ", "));
        if field.kind() == FieldKind::Select {
            let options: &[String] =
                if field.is_node_dependent() { form.node_choices() } else { form.models() };
            if !options.is_empty() {
                let _ = writeln!(out, "  {:<15} options: {}", "", options.join(", "));
            }
        }
    }
    for &group in spec.groups {
        if !form.is_group_visible(group) {
            continue;
        }
        let chosen = form.choice(group);
        let opts: Vec<String> = group
            .options()
            .iter()
            .map(|o| if Some(*o) == chosen { format!("[{o}]") } else { o.to_string() })
            .collect();
        let _ = writeln!(out, "  {:<15} {}", group.as_str(), opts.join(" | "));
    }
    if state.step() == 4 {
        for section in Section::ALL {
            let shown = if form.is_enabled(section) { "on" } else { "off" };
            let _ = writeln!(out, "  section {:<7} {}", section.as_str(), shown);
        }
    }
    if state.is_terminal() {
        match build_config(form) {
            Ok(cfg) => {
                let _ = writeln!(out, "  mode            {}", cfg.mode.as_str());
                let _ = writeln!(out, "  platform        {}", cfg.platform.as_str());
                let _ = writeln!(out, "  nodes           {}", cfg.target_nodes.join(", "));
                let _ = writeln!(
                    out,
                    "  inference       {}:{} ({})",
                    cfg.inference_host, cfg.inference_port, cfg.model_name
                );
                if let Some(rag) = &cfg.rag {
                    let _ = writeln!(out, "  rag             {}:{}", rag.host, rag.port);
                }
                if let Some(vdb) = &cfg.vectordb {
                    let kind = vdb.kind.as_str();
                    let _ = writeln!(out, "  vectordb        {} {}:{}", kind, vdb.host, vdb.port);
                }
                if let Some(parser) = &cfg.parser {
                    let _ = writeln!(out, "  parser          {}:{}", parser.host, parser.port);
                }
            }
            Err(e) => {
                let _ = writeln!(out, "  incomplete: {e}");
            }
        }
    }

    let gate = state.gate();
    let (ssh, inference) = (mark(gate.ssh()), mark(gate.inference()));
    let _ = writeln!(out, "  verified        ssh {ssh}  inference {inference}");

    let action = if state.is_terminal() { "Submit" } else { "Next" };
    let blocked = blockers(state.step(), form, gate);
    if blocked.is_empty() {
        let _ = writeln!(out, "  {action}: enabled");
    } else {
        let reasons: Vec<String> = blocked.iter().map(|b| b.describe()).collect();
        let _ = writeln!(out, "  {action}: disabled ({})", reasons.join("; "));
    }
    out
}

fn class_icon(class: HealthClass) -> &'static str {
    match class {
        HealthClass::Online => "🟢",
        HealthClass::Warning => "🟡",
        HealthClass::Down => "🔴",
        HealthClass::Offline => "⚫",
    }
}

fn pct(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.1}%")).unwrap_or_else(|| PLACEHOLDER.to_string())
}

pub fn render_overview(views: &[NodeView]) -> String {
    if views.is_empty() {
        return "No nodes registered.\n".to_string();
    }
    let mut out = String::new();
    for view in views {
        let age = view
            .age_secs
            .map(|a| format!("{a}s ago"))
            .unwrap_or_else(|| "never".to_string());
        let host = or_placeholder(&view.hostname);
        let _ = writeln!(
            out,
            "{} {:<15} {:<12} {:<8} last seen {:<9} cpu {:>6}  mem {:>6}  docker {}",
            class_icon(view.class),
            view.ip,
            host,
            view.class.as_str(),
            age,
            pct(view.cpu_usage),
            pct(view.memory_usage),
            view.docker_status.as_deref().unwrap_or(PLACEHOLDER),
        );
        if !view.gpu_status.is_empty() || !view.os_spec.is_empty() {
            let (gpu, os) = (or_placeholder(&view.gpu_status), or_placeholder(&view.os_spec));
            let _ = writeln!(out, "    gpu: {gpu}  os: {os}");
        }
        if let Some(deployed) = &view.deployment_time {
            let _ = writeln!(out, "    deployed: {deployed}");
        }
        for svc in &view.services {
            let _ = writeln!(
                out,
                "    - {:<20} {:<28} {:<9} {}",
                svc.name,
                svc.image,
                svc.state,
                svc.uptime.as_deref().unwrap_or(PLACEHOLDER),
            );
        }
    }
    out
}

fn or_placeholder(s: &str) -> &str {
    if s.is_empty() {
        PLACEHOLDER
    } else {
        s
    }
}

pub fn render_progress(progress: &PollProgress, max_attempts: u32) -> String {
    let (node, attempt) = (&progress.node, progress.attempt);
    match progress.phase {
        PollPhase::Waiting => format!("⏳ [{attempt}/{max_attempts}] waiting for agent on {node}"),
        PollPhase::Starting => {
            format!("🔄 [{attempt}/{max_attempts}] agent online on {node}, services still starting")
        }
        PollPhase::Ready => format!("✅ {node} is up and serving"),
        PollPhase::TimedOut => format!("❌ {node} did not come up after {attempt} attempts"),
    }
}
