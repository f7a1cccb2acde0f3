//! Line commands understood by the headless shell. Anything that is not a
//! slash command is added to the prompt field and sent; an empty line sends
//! whatever the field holds (e.g. dictated text).

use ozone_core::PipelineId;
use serde_json::Value;

pub const HELP: &str = "\
/panels                 list mounted panels
/show <panel-id>        select a panel and render it
/inject <pipeline> [json]  mount a pipeline panel (selected)
/uninject <panel-id>    remove a panel
/tasks                  list backend tasks
/cancel <task-id>       cancel a backend task
/voice                  toggle microphone capture (final text lands in the prompt)
/prompt                 show the prompt field
/send                   send the prompt field (same as an empty line)
/affect on|off          toggle affect, reflection and speech
/status                 connection and affect snapshot
/config                 show backend configuration
/quit                   exit
<text>                  add to the prompt field and send it";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    Panels,
    Show(String),
    Inject { pipeline_id: PipelineId, data: Option<Value> },
    Uninject(String),
    Tasks,
    Cancel(String),
    Voice,
    ShowPrompt,
    Send,
    Affect(bool),
    Status,
    Config,
    Prompt(String),
}

/// Parse one input line. `Err` carries a usage hint.
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Send);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Prompt(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match (name, arg) {
        ("help", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        ("panels", _) => Command::Panels,
        ("tasks", _) => Command::Tasks,
        ("voice", _) => Command::Voice,
        ("prompt", _) => Command::ShowPrompt,
        ("send", _) => Command::Send,
        ("status", _) => Command::Status,
        ("config", _) => Command::Config,
        ("show", id) if !id.is_empty() => Command::Show(id.to_string()),
        ("uninject", id) if !id.is_empty() => Command::Uninject(id.to_string()),
        ("cancel", id) if !id.is_empty() => Command::Cancel(id.to_string()),
        ("affect", "on") => Command::Affect(true),
        ("affect", "off") => Command::Affect(false),
        ("inject", arg) if !arg.is_empty() => {
            let (id, data) = match arg.split_once(char::is_whitespace) {
                Some((id, data)) => (id, Some(data.trim())),
                None => (arg, None),
            };
            let pipeline_id = id
                .parse::<PipelineId>()
                .map_err(|_| format!("not a pipeline id: {}", id))?;
            let data = data
                .map(serde_json::from_str::<Value>)
                .transpose()
                .map_err(|e| format!("step data is not JSON: {}", e))?;
            Command::Inject { pipeline_id, data }
        }
        _ => return Err(format!("unknown or incomplete command: /{} (try /help)", rest)),
    };
    Ok(command)
}
