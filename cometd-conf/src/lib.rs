#![deny(unsafe_code)]

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use config::{Config, File};
use once_cell::sync::OnceCell;
use serde::Deserialize;

use cometd_utils::Bytesize;

use self::logging::Log;

pub use self::options::Options;

pub mod logging;
pub mod options;

static SETTINGS: OnceCell<Settings> = OnceCell::new();

#[derive(Clone)]
pub struct Settings(Arc<Inner>);

#[derive(Debug, Clone, Deserialize)]
pub struct Inner {
    #[serde(default)]
    pub log: Log,
    #[serde(default)]
    pub message: MessageConf,
    #[serde(default, skip)]
    pub opts: Options,
}

impl Deref for Settings {
    type Target = Inner;
    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl Settings {
    pub fn new(opts: Options) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::with_name("/etc/cometd/cometd").required(false))
            .add_source(File::with_name("cometd").required(false))
            .add_source(
                config::Environment::with_prefix("cometd")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(cfg) = opts.cfg_name.as_ref() {
            builder = builder.add_source(File::with_name(cfg).required(true));
        }

        let mut inner: Inner = builder.build()?.try_deserialize()?;

        //Command line configuration overriding file configuration
        if let Some(threshold) = opts.zip_message_size_threshold {
            inner.message.zip_message_size_threshold = threshold;
        }
        if let Some(ignore_null_data) = opts.ignore_null_data {
            inner.message.ignore_null_data = ignore_null_data;
        }

        inner.opts = opts;
        Ok(Self(Arc::new(inner)))
    }

    #[inline]
    pub fn instance() -> &'static Self {
        match SETTINGS.get() {
            Some(c) => c,
            None => {
                unreachable!("Settings not initialized");
            }
        }
    }

    #[inline]
    pub fn init(opts: Options) -> Result<&'static Self> {
        SETTINGS.set(Settings::new(opts)?).map_err(|_| anyhow!("Settings init failed"))?;
        SETTINGS.get().ok_or_else(|| anyhow!("Settings init failed"))
    }

    #[inline]
    pub fn logs() -> Result<()> {
        let cfg = Self::instance();
        log::debug!("Config info is {:?}", cfg.0);
        log::info!("message.zip_message_size_threshold is {:?}", cfg.message.zip_message_size_threshold);
        log::info!("message.ignore_null_data is {}", cfg.message.ignore_null_data);
        if let Some(cfg_name) = cfg.opts.cfg_name.as_ref() {
            log::info!("config file is {cfg_name}");
        }
        Ok(())
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Settings ...")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageConf {
    //Serialized JSON longer than this many bytes is stored gzipped.
    #[serde(default = "MessageConf::zip_message_size_threshold_default")]
    pub zip_message_size_threshold: Bytesize,

    //Omit a null "data" field from frozen messages.
    #[serde(default)]
    pub ignore_null_data: bool,
}

impl Default for MessageConf {
    #[inline]
    fn default() -> Self {
        Self { zip_message_size_threshold: Self::zip_message_size_threshold_default(), ignore_null_data: false }
    }
}

impl MessageConf {
    fn zip_message_size_threshold_default() -> Bytesize {
        Bytesize::from("50K")
    }
}
