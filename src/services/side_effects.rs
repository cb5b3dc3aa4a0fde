use crate::config::ActionsConfig;
use crate::engine::{SideEffect, SideEffectSink, Surface};
use crate::error::Result;
use crate::events::KeyCode;
use crate::mappings::key_names::KEY_BACK;
use crate::paper_error;
use crate::services::VirtualDevice;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Побочные эффекты через uinput (Back) и внешние команды (всё остальное).
pub struct CommandSideEffects {
    virtual_device: Arc<VirtualDevice>,
    actions: ActionsConfig,
    dry_run: bool,
}

impl CommandSideEffects {
    pub fn new(virtual_device: Arc<VirtualDevice>, actions: ActionsConfig, dry_run: bool) -> Self {
        Self {
            virtual_device,
            actions,
            dry_run,
        }
    }

    /// Командная строка для эффекта, с подставленным компонентом.
    pub fn command_for(&self, effect: &SideEffect) -> Option<String> {
        let template = match effect {
            SideEffect::Back => return None,
            SideEffect::Screenshot => &self.actions.screenshot_command,
            SideEffect::Launch(Surface::QuickSettings) => &self.actions.quick_settings_command,
            SideEffect::Launch(Surface::Brightness) => &self.actions.brightness_command,
            SideEffect::Launch(Surface::Home(component)) => {
                return Some(self.actions.home_command.replace("{component}", component));
            }
        };
        Some(template.clone())
    }

    fn spawn(&self, effect: &SideEffect, command_line: &str) -> Result<()> {
        if command_line.trim().is_empty() {
            return Err(paper_error!(service_unavailable, "для '{}' не настроена команда", effect));
        }

        if self.dry_run {
            info!("[DRY RUN] {}: {}", effect, command_line);
            return Ok(());
        }

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| paper_error!(service_unavailable, "не удалось запустить '{}': {}", command_line, e))?;

        debug!("Запущено '{}' (pid {})", command_line, child.id());

        // Не ждём завершения, но забираем статус, чтобы не копить зомби
        let command_line = command_line.to_string();
        thread::Builder::new()
            .name("action-reaper".to_string())
            .spawn(move || match child.wait() {
                Ok(status) if !status.success() => warn!("'{}' завершилась с {}", command_line, status),
                Ok(_) => {}
                Err(e) => warn!("Не удалось дождаться '{}': {}", command_line, e),
            })?;
        Ok(())
    }
}

impl SideEffectSink for CommandSideEffects {
    fn emit(&self, effect: &SideEffect) -> Result<()> {
        info!("Действие: {}", effect);
        match self.command_for(effect) {
            None => self.virtual_device.tap(KeyCode(KEY_BACK)),
            Some(command_line) => self.spawn(effect, &command_line),
        }
    }
}
