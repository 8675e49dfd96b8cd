use rmpv::Value;

use crate::plugin::command::{CommandSpec, Nargs};
use crate::plugin::{CommandError, CommandRegistry, Host};
use crate::rpc::RpcError;

pub const FOO_COMMAND: &str = "MyPluginFoo";
const FOO_MESSAGE: &str = "Whatever\n";

/// The plugin object. Holds the host it was loaded into and nothing else.
pub struct MyPlugin<H> {
    nvim: H,
}

impl<H: Host + 'static> MyPlugin<H> {
    pub fn new(nvim: H) -> Self {
        Self { nvim }
    }

    /// `:MyPluginFoo`
    pub fn foo(&self) -> Result<(), RpcError> {
        self.nvim.out_write(FOO_MESSAGE)
    }

    /// Bind every command this plugin exposes into `registry`.
    pub fn register(self, registry: &mut CommandRegistry) -> Result<(), CommandError> {
        registry.register(
            CommandSpec::new(FOO_COMMAND, Nargs::Zero),
            Box::new(move |_args: &[Value]| {
                self.foo()?;
                Ok(Value::Nil)
            }),
        )
    }
}
