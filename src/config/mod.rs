use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use toml::map::Entry;
use tracing::warn;

use crate::input::tablet::{default_button_map, ActiveArea, Rotation, TabletButtonMapping};
use crate::menu::{definition::MenuDefinition, layout::StackedLayout, pipe::PipeMenuPolicy};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub menu: MenuConfig,
    pub tablet: TabletConfig,
    pub menus: Vec<MenuDefinition>,
}

static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn with<R>(f: impl FnOnce(&Config) -> R) -> R {
        let config = CONFIG.get_or_init(Config::init);
        f(config)
    }

    fn init() -> Self {
        // Lowest to highest priority
        let mut sources = Vec::new();
        sources.extend(get_system_config_path());
        sources.extend(get_user_config_path());
        sources.push(PathBuf::from("otto_menu.toml"));

        let config = Self::from_sources(&sources);
        tracing::info!(
            menus = config.menus.len(),
            hover_delay_ms = config.menu.hover_delay_ms,
            "Menu config initialized"
        );
        config
    }

    /// Merge every readable source on top of the defaults, later sources win
    pub fn from_sources<P: AsRef<Path>>(sources: &[P]) -> Self {
        let mut merged =
            toml::Value::try_from(Self::default()).expect("default config is always valid toml");

        let mut found_any_config = false;
        for source in sources {
            let path = source.as_ref();
            let Ok(content) = std::fs::read_to_string(path) else {
                continue;
            };
            match content.parse::<toml::Value>() {
                Ok(value) => {
                    merge_value(&mut merged, value);
                    found_any_config = true;
                    tracing::info!("Loaded menu config from {}", path.display());
                }
                Err(err) => warn!("Failed to parse {}: {err}", path.display()),
            }
        }

        if !found_any_config {
            warn!("No menu configuration file found, using default config");
        }

        merged.try_into().unwrap_or_else(|err| {
            warn!("Falling back to default config due to invalid overrides: {err}");
            Self::default()
        })
    }
}

fn merge_value(base: &mut toml::Value, overrides: toml::Value) {
    match (base, overrides) {
        (toml::Value::Table(base_map), toml::Value::Table(override_map)) => {
            for (key, override_value) in override_map {
                match base_map.entry(key) {
                    Entry::Occupied(mut entry) => merge_value(entry.get_mut(), override_value),
                    Entry::Vacant(entry) => {
                        entry.insert(override_value);
                    }
                }
            }
        }
        (base_value, override_value) => {
            *base_value = override_value;
        }
    }
}

fn get_system_config_path() -> Option<PathBuf> {
    let path = PathBuf::from("/etc/otto/menu.toml");
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

fn get_user_config_path() -> Option<PathBuf> {
    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join(".config"))
        })?;

    let path = config_dir.join("otto").join("menu.toml");
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuConfig {
    /// Delay before a hovered item opens its submenu, 0 opens immediately
    #[serde(default = "default_hover_delay_ms")]
    pub hover_delay_ms: u32,
    #[serde(default)]
    pub pipemenu: PipeMenuConfig,
    #[serde(default)]
    pub layout: StackedLayout,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            hover_delay_ms: default_hover_delay_ms(),
            pipemenu: PipeMenuConfig::default(),
            layout: StackedLayout::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipeMenuConfig {
    #[serde(default)]
    pub policy: PipeMenuPolicy,
    #[serde(default = "default_pipemenu_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_pipemenu_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for PipeMenuConfig {
    fn default() -> Self {
        Self {
            policy: PipeMenuPolicy::default(),
            timeout_ms: default_pipemenu_timeout_ms(),
            max_output_bytes: default_pipemenu_max_output_bytes(),
        }
    }
}

/// Drawing tablet mapping, applied before tablet motion reaches the cursor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabletConfig {
    #[serde(default)]
    pub active_area: Option<ActiveArea>,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default = "default_button_map")]
    pub button_map: Vec<TabletButtonMapping>,
}

impl Default for TabletConfig {
    fn default() -> Self {
        Self {
            active_area: None,
            rotation: Rotation::None,
            button_map: default_button_map(),
        }
    }
}

fn default_hover_delay_ms() -> u32 {
    200
}

fn default_pipemenu_timeout_ms() -> u64 {
    4000
}

fn default_pipemenu_max_output_bytes() -> usize {
    1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::tablet::{PointerButton, TabletButton};
    use crate::menu::definition::ItemDefinition;
    use serial_test::serial;
    use std::env;
    use std::fs;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.menu.hover_delay_ms, 200);
        assert_eq!(config.menu.pipemenu.policy, PipeMenuPolicy::Regenerate);
        assert_eq!(config.menu.pipemenu.timeout_ms, 4000);
        assert_eq!(config.tablet.rotation, Rotation::None);
        assert!(config.tablet.active_area.is_none());
        assert_eq!(config.tablet.button_map.len(), 3);
        assert!(config.menus.is_empty());
    }

    #[test]
    fn tablet_section_from_toml() {
        let overrides = r#"
            [tablet]
            rotation = 90
            active_area = { x = 10.0, y = 5.0, width = 100.0 }
            button_map = [{ button = "stylus", to = "middle" }]
        "#;

        let config: Config = toml::from_str(overrides).expect("Config should deserialize");
        assert_eq!(config.tablet.rotation, Rotation::Rotate90);
        let area = config.tablet.active_area.unwrap();
        assert_eq!((area.x, area.y, area.width, area.height), (10.0, 5.0, 100.0, 0.0));
        assert_eq!(
            config.tablet.button_map,
            vec![TabletButtonMapping {
                button: TabletButton::Stylus,
                to: PointerButton::Middle,
            }]
        );
    }

    #[test]
    fn invalid_rotation_is_rejected() {
        let overrides = r#"
            [tablet]
            rotation = 45
        "#;
        assert!(toml::from_str::<Config>(overrides).is_err());
    }

    #[test]
    fn menus_from_toml() {
        let overrides = r#"
            [[menus]]
            id = "root-menu"

            [[menus.items]]
            type = "item"
            label = "Terminal"
            actions = [{ name = "Execute", args = { command = "foot" } }]

            [[menus.items]]
            type = "separator"

            [[menus.items]]
            type = "menu"
            id = "places"
            label = "Places"
            execute = "otto-places-menu"
        "#;

        let config: Config = toml::from_str(overrides).expect("Config should deserialize");
        assert_eq!(config.menus.len(), 1);
        let root = &config.menus[0];
        assert_eq!(root.id, "root-menu");
        assert_eq!(root.items.len(), 3);
        match &root.items[2] {
            ItemDefinition::Menu(places) => {
                assert_eq!(places.execute.as_deref(), Some("otto-places-menu"));
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn example_config_parses() {
        let config: Config = toml::from_str(include_str!("../../otto_menu.example.toml"))
            .expect("example config should deserialize");
        assert_eq!(config.menus.len(), 2);
        assert_eq!(config.tablet.button_map, default_button_map());

        let registry = crate::menu::MenuRegistry::from_definitions(&config.menus);
        assert!(registry.lookup("places-menu").unwrap().is_pipemenu());
        assert_eq!(registry.lookup("session-menu").unwrap().items().len(), 3);
        assert_eq!(registry.lookup("client-menu").unwrap().items().len(), 4);
    }

    #[test]
    #[serial]
    fn test_get_user_config_path_with_xdg_config_home() {
        let temp_dir = tempfile::tempdir().unwrap();

        let old_xdg = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", temp_dir.path());

        let config_dir = temp_dir.path().join("otto");
        fs::create_dir_all(&config_dir).unwrap();
        let config_file = config_dir.join("menu.toml");
        fs::write(&config_file, "# test config").unwrap();

        let path = get_user_config_path();
        assert_eq!(path, Some(config_file));

        if let Some(old) = old_xdg {
            env::set_var("XDG_CONFIG_HOME", old);
        } else {
            env::remove_var("XDG_CONFIG_HOME");
        }
    }

    #[test]
    #[serial]
    fn test_get_user_config_path_without_file() {
        let temp_dir = tempfile::tempdir().unwrap();

        let old_xdg = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", temp_dir.path());

        assert!(get_user_config_path().is_none());

        if let Some(old) = old_xdg {
            env::set_var("XDG_CONFIG_HOME", old);
        } else {
            env::remove_var("XDG_CONFIG_HOME");
        }
    }

    #[test]
    fn test_config_partial_override() {
        let mut base =
            toml::Value::try_from(Config::default()).expect("default config is valid toml");

        let override_value: toml::Value = r#"
            [menu.pipemenu]
            timeout_ms = 250
        "#
        .parse()
        .unwrap();

        merge_value(&mut base, override_value);

        let config: Config = base.try_into().unwrap();
        assert_eq!(config.menu.pipemenu.timeout_ms, 250);
        // Siblings keep their defaults
        assert_eq!(config.menu.pipemenu.max_output_bytes, 1024 * 1024);
        assert_eq!(config.menu.hover_delay_ms, 200);
    }

    #[test]
    fn later_sources_win() {
        let dir = tempfile::tempdir().unwrap();
        let system = dir.path().join("system.toml");
        let user = dir.path().join("user.toml");
        let broken = dir.path().join("broken.toml");
        fs::write(&system, "[menu]\nhover_delay_ms = 50\n[menu.pipemenu]\npolicy = \"cache\"\n")
            .unwrap();
        fs::write(&user, "[menu]\nhover_delay_ms = 0\n").unwrap();
        fs::write(&broken, "this is = = not toml").unwrap();

        let missing = dir.path().join("missing.toml");
        let config = Config::from_sources(&[system, missing, user, broken]);
        assert_eq!(config.menu.hover_delay_ms, 0);
        assert_eq!(config.menu.pipemenu.policy, PipeMenuPolicy::Cache);
    }

    #[test]
    fn invalid_merged_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("menu.toml");
        fs::write(&path, "[menu]\nhover_delay_ms = \"soon\"\n").unwrap();

        let config = Config::from_sources(&[path]);
        assert_eq!(config.menu.hover_delay_ms, 200);
    }
}
