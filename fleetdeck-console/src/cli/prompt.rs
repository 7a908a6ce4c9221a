//! Interactive terminal wizard.
//!
//! Each step is first filled in guided mode (one question per visible
//! field, current value as default), then the operator drives the wizard
//! with short commands until the deployment is accepted or they quit.

use anyhow::{Context, Result};
use std::io::{self, Write};

use crate::models::{DeploymentMode, ProbeKind};
use crate::view::render_wizard;
use crate::wizard::{
    step, ChoiceGroup, FieldId, Notice, NoticeLevel, Section, WizardEvent, WizardSession,
};

const HELP: &str = "\
Commands:
  set <field> <value>        edit a field (e.g. set inference_port 8001)
  choose <group> <value>     pick an option (mode, platform, vector_db)
  toggle <section> on|off    show/hide rag, vectordb or parser
  probe <kind>               test ssh, inference, rag_app, vectordb or parser
  models | detect | save     discover models, detect hardware, save node list
  next | back | submit       navigate (empty line = next / submit)
  reset | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Event(WizardEvent),
    Help,
    Quit,
}

/// Parse one command line. `terminal` picks what an empty line means.
pub fn parse_input(line: &str, terminal: bool) -> Result<Input, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Event(if terminal { WizardEvent::Submit } else { WizardEvent::Next }));
    }
    let (cmd, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let event = match cmd.to_ascii_lowercase().as_str() {
        "q" | "quit" | "exit" => return Ok(Input::Quit),
        "h" | "help" | "?" => return Ok(Input::Help),
        "n" | "next" => WizardEvent::Next,
        "b" | "back" => WizardEvent::Back,
        "submit" | "deploy" => WizardEvent::Submit,
        "reset" => WizardEvent::Reset,
        "models" => WizardEvent::DiscoverModels,
        "detect" => WizardEvent::DetectHardware,
        "save" => WizardEvent::SaveNodes,
        "set" => {
            let (name, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let field = FieldId::parse(name).ok_or_else(|| format!("unknown field `{name}`"))?;
            WizardEvent::Edit(field, value.trim().to_string())
        }
        "choose" => {
            let (name, value) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: choose <group> <value>".to_string())?;
            let group = ChoiceGroup::parse(name).ok_or_else(|| format!("unknown group `{name}`"))?;
            WizardEvent::Choose(group, value.trim().to_string())
        }
        "toggle" => {
            let (name, state) = rest.split_once(char::is_whitespace).unwrap_or((rest, "on"));
            let section = Section::parse(name).ok_or_else(|| format!("unknown section `{name}`"))?;
            let on = match state.trim() {
                "on" | "yes" | "y" => true,
                "off" | "no" | "n" => false,
                other => return Err(format!("expected on/off, got `{other}`")),
            };
            WizardEvent::Toggle(section, on)
        }
        "probe" | "verify" => {
            let kind = ProbeKind::parse(rest).ok_or_else(|| format!("unknown probe `{rest}`"))?;
            WizardEvent::Probe(kind)
        }
        other => return Err(format!("unknown command `{other}` (try `help`)")),
    };
    Ok(Input::Event(event))
}

pub fn print_notices(notices: &[Notice]) {
    for notice in notices {
        let icon = match notice.level {
            NoticeLevel::Info => "ℹ️ ",
            NoticeLevel::Success => "✅",
            NoticeLevel::Error => "❌",
        };
        println!("{} {}", icon, notice.text);
    }
}

/// Run the wizard until a deployment is accepted. Returns the node to watch.
pub async fn run_wizard(session: &mut WizardSession) -> Result<Option<String>> {
    println!();
    println!("🚀 ======================================");
    println!("   FLEETDECK DEPLOYMENT WIZARD");
    println!("🚀 ======================================");
    println!("Type `help` for commands.");
    println!();

    let mut guided_step = 0u8;
    loop {
        if let Some(addr) = session.handoff() {
            return Ok(Some(addr.to_string()));
        }
        let current = session.state().step();
        if current != guided_step {
            guided_step = current;
            guide_step(session).await?;
        }

        println!();
        print!("{}", render_wizard(session.state()));
        let line = prompt_line("›")?;
        match parse_input(&line, session.state().is_terminal()) {
            Ok(Input::Quit) => {
                println!("❌ Wizard cancelled.");
                return Ok(None);
            }
            Ok(Input::Help) => println!("{HELP}"),
            Ok(Input::Event(event)) => {
                let reset = event == WizardEvent::Reset;
                let notices = session.dispatch(event).await;
                print_notices(&notices);
                if reset {
                    guided_step = 0;
                }
            }
            Err(msg) => println!("❌ {msg}"),
        }
    }
}

async fn edit_if_changed(session: &mut WizardSession, field: FieldId, value: String) {
    if session.state().form().value(field) != value {
        let notices = session.dispatch(WizardEvent::Edit(field, value)).await;
        print_notices(&notices);
    }
}

async fn ask_field(session: &mut WizardSession, field: FieldId) -> Result<()> {
    let form = session.state().form();
    let options: Vec<String> = if field.is_node_dependent() {
        form.node_choices().to_vec()
    } else if field == FieldId::ModelName {
        form.models().to_vec()
    } else {
        Vec::new()
    };
    if !options.is_empty() {
        println!("   options: {}", options.join(", "));
    }
    let current = form.value(field).to_string();
    let value = if field == FieldId::TargetNodes {
        prompt_with_default(
            "target_nodes (comma separated host[:port])",
            &current.replace('\n', ", "),
        )?
    } else {
        prompt_with_default(field.as_str(), &current)?
    };
    edit_if_changed(session, field, value).await;
    Ok(())
}

async fn ask_group(session: &mut WizardSession, group: ChoiceGroup) -> Result<()> {
    let form = session.state().form();
    let current = form.choice(group).unwrap_or(group.options()[0]).to_string();
    let options: Vec<(&str, &str)> = group.options().iter().map(|o| (*o, "")).collect();
    let picked = prompt_with_options(group.as_str(), &options, &current)?;
    if form.choice(group) != Some(picked.as_str()) {
        let notices = session.dispatch(WizardEvent::Choose(group, picked)).await;
        print_notices(&notices);
    }
    Ok(())
}

/// One pass of questions over the current step.
async fn guide_step(session: &mut WizardSession) -> Result<()> {
    let spec = step(session.state().step());
    println!();
    println!("📋 STEP {} - {}", spec.number, spec.title.to_uppercase());
    println!("────────────────────────────────────────");

    match spec.number {
        1 => {
            for &field in spec.fields {
                ask_field(session, field).await?;
            }
            if prompt_yes_no("Verify SSH connectivity now?", true)? {
                print_notices(&session.dispatch(WizardEvent::Probe(ProbeKind::Ssh)).await);
            }
        }
        2 => {
            for &group in spec.groups {
                ask_group(session, group).await?;
            }
        }
        3 => {
            for &field in spec.fields {
                ask_field(session, field).await?;
            }
            let verified = session.state().gate().inference();
            if !verified {
                let event = match session.state().form().mode() {
                    DeploymentMode::NewDeployment => WizardEvent::DiscoverModels,
                    DeploymentMode::IntegrateExisting => WizardEvent::Probe(ProbeKind::Inference),
                };
                if prompt_yes_no("Verify the inference service now?", true)? {
                    print_notices(&session.dispatch(event).await);
                }
            }
        }
        4 => {
            for section in Section::ALL {
                let enabled = session.state().form().is_enabled(section);
                let on = prompt_yes_no(&format!("Enable {}?", section.as_str()), enabled)?;
                if on != enabled {
                    session.dispatch(WizardEvent::Toggle(section, on)).await;
                }
                if !on {
                    continue;
                }
                if section == Section::VectorDb {
                    ask_group(session, ChoiceGroup::VectorDb).await?;
                }
                for &field in spec.fields.iter().filter(|f| f.section() == Some(section)) {
                    ask_field(session, field).await?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{} ", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    let read = io::stdin().read_line(&mut input).context("failed to read from stdin")?;
    if read == 0 {
        return Ok("quit".to_string());
    }
    Ok(input.trim().to_string())
}

fn prompt_with_default(prompt: &str, default: &str) -> Result<String> {
    print!("❓ {} [{}]: ", prompt, default);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input.to_string())
    }
}

fn prompt_yes_no(prompt: &str, default: bool) -> Result<bool> {
    let default_str = if default { "Y/n" } else { "y/N" };

    loop {
        print!("❓ {} [{}]: ", prompt, default_str);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() {
            return Ok(default);
        }

        match input.as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => println!("❌ Please enter 'y' or 'n'."),
        }
    }
}

fn prompt_with_options(prompt: &str, options: &[(&str, &str)], default: &str) -> Result<String> {
    println!("❓ {}:", prompt);
    for (key, description) in options {
        let marker = if *key == default { "►" } else { " " };
        if description.is_empty() {
            println!("  {} {}", marker, key);
        } else {
            println!("  {} {} - {}", marker, key, description);
        }
    }

    loop {
        print!("Choice [{}]: ", default);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        if input.is_empty() {
            return Ok(default.to_string());
        }
        if options.iter().any(|(key, _)| *key == input) {
            return Ok(input.to_string());
        }
        println!("❌ Invalid choice. Please select from the available options.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_line_advances_or_submits() {
        assert_eq!(parse_input("", false), Ok(Input::Event(WizardEvent::Next)));
        assert_eq!(parse_input("  ", true), Ok(Input::Event(WizardEvent::Submit)));
    }

    #[test]
    fn set_keeps_the_rest_of_the_line() {
        assert_eq!(
            parse_input("set target_nodes 10.0.0.5:22, 10.0.0.6", false),
            Ok(Input::Event(WizardEvent::Edit(
                FieldId::TargetNodes,
                "10.0.0.5:22, 10.0.0.6".into()
            )))
        );
        assert_eq!(
            parse_input("set model_name", false),
            Ok(Input::Event(WizardEvent::Edit(FieldId::ModelName, String::new())))
        );
    }

    #[test]
    fn choose_toggle_and_probe() {
        assert_eq!(
            parse_input("choose mode integrate_existing", false),
            Ok(Input::Event(WizardEvent::Choose(ChoiceGroup::Mode, "integrate_existing".into())))
        );
        assert_eq!(
            parse_input("toggle parser on", false),
            Ok(Input::Event(WizardEvent::Toggle(Section::Parser, true)))
        );
        assert_eq!(
            parse_input("probe ssh", false),
            Ok(Input::Event(WizardEvent::Probe(ProbeKind::Ssh)))
        );
    }

    #[test]
    fn bad_input_is_explained() {
        assert!(parse_input("set nope 1", false).unwrap_err().contains("nope"));
        assert!(parse_input("toggle rag maybe", false).is_err());
        assert!(parse_input("launch", false).is_err());
        assert_eq!(parse_input("quit", false), Ok(Input::Quit));
    }
}
