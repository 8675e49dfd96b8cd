use anyhow::Result;
use rmpv::Value;

use crate::msg::Msg;
use crate::plugin::{CommandRegistry, MyPlugin};
use crate::rpc::Nvim;

pub struct App {
    pub nvim: Nvim,
    pub registry: CommandRegistry,
    pub should_quit: bool,
}

impl App {
    pub fn new(nvim: Nvim) -> Result<Self> {
        let mut registry = CommandRegistry::new();
        MyPlugin::new(nvim.clone()).register(&mut registry)?;
        tracing::info!(commands = registry.command_count(), "plugin registered");

        Ok(Self {
            nvim,
            registry,
            should_quit: false,
        })
    }

    pub fn update(&mut self, msg: Msg) -> Result<()> {
        match msg {
            Msg::Request { id, method, params } => {
                let reply = self.handle_request(&method, &params);
                if let Err(err) = &reply {
                    tracing::warn!(id, method = %method, "request failed: {err}");
                }
                self.nvim.respond(id, reply)?;
            }
            Msg::Notification { method, params } => self.handle_notification(&method, &params),
            Msg::Closed => {
                tracing::info!("nvim closed the channel");
                self.should_quit = true;
            }
        }

        Ok(())
    }

    fn handle_request(&self, method: &str, params: &[Value]) -> Result<Value, String> {
        match method {
            "poll" => Ok(Value::from("ok")),
            "specs" => Ok(self.registry.specs()),
            _ if self.registry.supports_command(method) => self
                .registry
                .dispatch(method, params)
                .map_err(|err| err.to_string()),
            _ => Err(format!("unknown request: {method}")),
        }
    }

    fn handle_notification(&self, method: &str, params: &[Value]) {
        if !self.registry.supports_command(method) {
            tracing::debug!(method, "ignoring notification");
            return;
        }

        if let Err(err) = self.registry.dispatch(method, params) {
            tracing::error!(method, "command failed: {err}");
            // Nobody waits on a notification; tell the user directly.
            if let Err(report_err) = self.nvim.err_writeln(&format!("my-plugin: {err}")) {
                tracing::warn!("failed to report command error: {report_err}");
            }
        }
    }
}
