//! GNOME Shell screencast over the session bus.
//!
//! GNOME Shell ends a screencast when the D-Bus peer that started it
//! disconnects, so the connection is opened once and kept for the life of
//! the daemon rather than per call.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use tracing::debug;
use zbus::blocking::{Connection, Proxy};
use zbus::zvariant::Value;

use super::recording::{
    OptionValue, ScreencastError, ScreencastOptions, ScreencastService, StartReply,
};

const BUS_NAME: &str = "org.gnome.Shell.Screencast";
const OBJECT_PATH: &str = "/org/gnome/Shell/Screencast";
const INTERFACE: &str = "org.gnome.Shell.Screencast";

/// `org.gnome.Shell.Screencast` client.
#[derive(Default)]
pub struct GnomeScreencast {
    proxy: Mutex<Option<Proxy<'static>>>,
}

impl GnomeScreencast {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_proxy<T>(
        &self,
        f: impl FnOnce(&Proxy<'static>) -> Result<T, ScreencastError>,
    ) -> Result<T, ScreencastError> {
        let mut slot = self.proxy.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            debug!("Connecting to session bus for {}", BUS_NAME);
            let connection = Connection::session()?;
            *slot = Some(Proxy::new(&connection, BUS_NAME, OBJECT_PATH, INTERFACE)?);
        }
        match slot.as_ref() {
            Some(proxy) => f(proxy),
            None => Err(ScreencastError::Unavailable(
                "session bus proxy missing".to_string(),
            )),
        }
    }
}

fn to_variant(value: &OptionValue) -> Value<'_> {
    match value {
        OptionValue::Str(s) => Value::from(s.as_str()),
        OptionValue::Bool(b) => Value::from(*b),
        OptionValue::Int32(n) => Value::from(*n),
    }
}

impl ScreencastService for GnomeScreencast {
    fn start(
        &self,
        output: &Path,
        options: &ScreencastOptions,
    ) -> Result<StartReply, ScreencastError> {
        let template = output.to_str().ok_or_else(|| {
            ScreencastError::Unavailable(format!("output path is not UTF-8: {:?}", output))
        })?;
        let variants: HashMap<&str, Value<'_>> = options
            .iter()
            .map(|(key, value)| (key.as_str(), to_variant(value)))
            .collect();

        self.with_proxy(|proxy| {
            let (success, path): (bool, String) =
                proxy.call("Screencast", &(template, variants))?;
            Ok(StartReply { success, path })
        })
    }

    fn stop(&self) -> Result<bool, ScreencastError> {
        self.with_proxy(|proxy| {
            let success: bool = proxy.call("StopScreencast", &())?;
            Ok(success)
        })
    }
}
