use std::collections::HashMap;

use rmpv::Value;

use crate::plugin::CommandError;
use crate::plugin::command::CommandSpec;

/// Receives the command-line arguments of one invocation.
type Handler = Box<dyn Fn(&[Value]) -> Result<Value, CommandError>>;

struct RegisteredCommand {
    spec: CommandSpec,
    handler: Handler,
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, RegisteredCommand>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: CommandSpec, handler: Handler) -> Result<(), CommandError> {
        if self.commands.contains_key(&spec.name) {
            return Err(CommandError::Duplicate(spec.name));
        }

        tracing::debug!(name = %spec.name, nargs = %spec.nargs, "registered command");
        self.commands
            .insert(spec.name.clone(), RegisteredCommand { spec, handler });
        Ok(())
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn supports_command(&self, method: &str) -> bool {
        self.commands.contains_key(command_name(method))
    }

    /// Run the command `method` names. The argument count is checked
    /// against the declared arity before the handler sees it.
    pub fn dispatch(&self, method: &str, params: &[Value]) -> Result<Value, CommandError> {
        let name = command_name(method);
        let command = self
            .commands
            .get(name)
            .ok_or_else(|| CommandError::Unknown(name.to_string()))?;

        let args = command_args(params);
        if !command.spec.nargs.accepts(args.len()) {
            return Err(CommandError::Arity {
                name: name.to_string(),
                expected: command.spec.nargs,
                got: args.len(),
            });
        }

        (command.handler)(args)
    }

    /// Registered commands in the shape of a `specs` answer, sorted by name.
    pub fn specs(&self) -> Value {
        let mut specs: Vec<&CommandSpec> = self.commands.values().map(|c| &c.spec).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        Value::Array(specs.into_iter().map(CommandSpec::to_value).collect())
    }
}

/// Neovim's rplugin host addresses commands as `<path>:command:<Name>`.
fn command_name(method: &str) -> &str {
    method
        .rsplit_once(":command:")
        .map(|(_, name)| name)
        .unwrap_or(method)
}

/// `<f-args>` arrive as a single list parameter; bare parameters are
/// accepted too for clients calling the method directly.
fn command_args(params: &[Value]) -> &[Value] {
    match params {
        [Value::Array(args)] => args.as_slice(),
        _ => params,
    }
}
