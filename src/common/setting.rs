//! setting config file
//! - `config_{ENV}.toml` in the working directory, optional
//! - environment variables prefixed with `DMXPRO__`, e.g. `DMXPRO__DMX__DEVICE_NAME`

use lazy_static::lazy_static;
use serde::Deserialize;
use std::env;

use super::error::DriverError;
use crate::driver::dmx::prelude::{DMXPRO_BAUD_RATE, DMXPRO_FRAME_RATE};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Env {
    pub env: String,
    pub log_level: String,
}

impl Default for Env {
    fn default() -> Self {
        Self {
            env: String::from("dev"),
            log_level: String::from("info"),
        }
    }
}

/// dmx usb pro 驱动配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DmxSettings {
    // 串口设备标识符，例如 /dev/ttyUSB0 或 COM3
    pub device_name: String,
    pub frame_rate: u32,
    pub baud_rate: u32,
    pub zero_on_init: bool,
    pub zero_on_shutdown: bool,
    // 不打开真实串口，数据只写入内存
    pub dummy: bool,
}

impl Default for DmxSettings {
    fn default() -> Self {
        Self {
            device_name: String::new(),
            frame_rate: DMXPRO_FRAME_RATE,
            baud_rate: DMXPRO_BAUD_RATE,
            zero_on_init: true,
            zero_on_shutdown: true,
            dummy: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub env: Env,
    pub dmx: DmxSettings,
}

impl Settings {
    /// load settings from `config_{ENV}.toml` and the environment
    pub fn load() -> Result<Self, DriverError> {
        let env_name = env::var("ENV").unwrap_or_else(|_| String::from("dev"));
        let file_name = format!("config_{}", env_name);

        config::Config::builder()
            .add_source(config::File::with_name(&file_name).required(false))
            .add_source(config::Environment::with_prefix("DMXPRO").separator("__"))
            .build()
            .and_then(|c| c.try_deserialize::<Settings>())
            .map_err(|e| DriverError::Config(format!("file: {}.toml, err: {}", file_name, e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, DriverError> {
        toml::from_str(content).map_err(|e| DriverError::Config(e.to_string()))
    }

    pub fn get<'a>() -> &'a Self {
        // 给静态变量延迟赋值的宏
        lazy_static! {
            static ref CACHE: Settings = Settings::load().unwrap_or_else(|e| {
                eprintln!("cannot load settings, use default, {}", e);
                Settings::default()
            });
        }
        &CACHE
    }
}
