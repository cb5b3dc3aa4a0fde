use crate::config::RefreshConfig;
use crate::engine::RefreshPrimitive;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Примитив перерисовки через управляющие файлы драйвера панели в sysfs.
pub struct SysfsRefreshPrimitive {
    mode_path: PathBuf,
    full_refresh_path: PathBuf,
}

impl SysfsRefreshPrimitive {
    /// Проверяет настроенные файлы один раз при старте. `None` означает, что
    /// на этом устройстве полная перерисовка недоступна.
    pub fn resolve(config: &RefreshConfig) -> Option<Self> {
        let (Some(mode_path), Some(full_refresh_path)) = (&config.mode_path, &config.full_refresh_path) else {
            info!("Пути примитива перерисовки не настроены");
            return None;
        };

        for path in [mode_path, full_refresh_path] {
            if let Err(e) = OpenOptions::new().write(true).open(path) {
                warn!("Примитив перерисовки недоступен: {:?}: {}", path, e);
                return None;
            }
        }

        info!(
            "Примитив перерисовки: mode={:?} full_refresh={:?}",
            mode_path, full_refresh_path
        );
        Some(Self {
            mode_path: mode_path.clone(),
            full_refresh_path: full_refresh_path.clone(),
        })
    }

    fn write_value(path: &Path, value: i32) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        file.write_all(value.to_string().as_bytes())
    }
}

impl RefreshPrimitive for SysfsRefreshPrimitive {
    fn set_mode(&mut self, value: i32) -> io::Result<()> {
        Self::write_value(&self.mode_path, value)
    }

    fn full_refresh(&mut self, surface_id: i32) -> io::Result<()> {
        Self::write_value(&self.full_refresh_path, surface_id)
    }
}

/// Только логирует, ничего не перерисовывает.
pub struct DryRunPrimitive;

impl RefreshPrimitive for DryRunPrimitive {
    fn set_mode(&mut self, value: i32) -> io::Result<()> {
        info!("[DRY RUN] set_mode({})", value);
        Ok(())
    }

    fn full_refresh(&mut self, surface_id: i32) -> io::Result<()> {
        info!("[DRY RUN] full_refresh({})", surface_id);
        Ok(())
    }
}

pub fn resolve_primitive(config: &RefreshConfig, dry_run: bool) -> Option<Box<dyn RefreshPrimitive>> {
    if dry_run {
        return Some(Box::new(DryRunPrimitive));
    }
    SysfsRefreshPrimitive::resolve(config).map(|p| Box::new(p) as Box<dyn RefreshPrimitive>)
}

/// Идентификатор поверхности: из конфигурации или из файла. Ноль не бывает валидным.
pub fn resolve_surface_id(config: &RefreshConfig) -> Option<u32> {
    if let Some(id) = config.surface_id.filter(|id| *id > 0) {
        return Some(id);
    }

    let path = config.surface_id_path.as_ref()?;
    match fs::read_to_string(path) {
        Ok(content) => match content.trim().parse::<u32>() {
            Ok(id) if id > 0 => {
                debug!("Поверхность {} прочитана из {:?}", id, path);
                Some(id)
            }
            _ => {
                warn!("Некорректный идентификатор поверхности в {:?}: {:?}", path, content.trim());
                None
            }
        },
        Err(e) => {
            warn!("Не удалось прочитать {:?}: {}", path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RefreshProtocol;

    fn sysfs_config(dir: &Path) -> RefreshConfig {
        let mode = dir.join("epd_mode");
        let full = dir.join("epd_full_refresh");
        fs::write(&mode, "").unwrap();
        fs::write(&full, "").unwrap();
        RefreshConfig {
            mode_path: Some(mode),
            full_refresh_path: Some(full),
            surface_id: Some(3),
            surface_id_path: None,
        }
    }

    #[test]
    fn test_unconfigured_primitive_is_absent() {
        assert!(SysfsRefreshPrimitive::resolve(&RefreshConfig::default()).is_none());
        assert!(resolve_primitive(&RefreshConfig::default(), true).is_some());
    }

    #[test]
    fn test_missing_control_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sysfs_config(dir.path());
        config.full_refresh_path = Some(dir.path().join("nope"));
        assert!(SysfsRefreshPrimitive::resolve(&config).is_none());
    }

    #[test]
    fn test_protocol_writes_control_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = sysfs_config(dir.path());
        let protocol = RefreshProtocol::new(resolve_primitive(&config, false));
        protocol.set_surface(resolve_surface_id(&config).unwrap());

        assert!(protocol.refresh_current().is_ok());
        assert_eq!(fs::read_to_string(dir.path().join("epd_full_refresh")).unwrap(), "3");
        assert_eq!(fs::read_to_string(dir.path().join("epd_mode")).unwrap(), "-1");
    }

    #[test]
    fn test_surface_id_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surface");
        fs::write(&path, "17\n").unwrap();

        let config = RefreshConfig {
            surface_id_path: Some(path.clone()),
            ..RefreshConfig::default()
        };
        assert_eq!(resolve_surface_id(&config), Some(17));

        fs::write(&path, "0").unwrap();
        assert_eq!(resolve_surface_id(&config), None);
    }
}
