//! Worker thread driving record delivery.
//!
//! The sender drains the dispatch queue in order, formats each record and
//! writes it through the [`ConnectionManager`]. It is the only thread that
//! touches the connection, so writes never interleave.

use std::{
    any::Any,
    io,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
};

use crossbeam_channel::{Receiver, Sender};

use crate::{
    diagnostics::Diagnostics,
    formatter::{FormatOptions, SharedFormatter, merge_static_fields, strip_prefixed_fields},
    log_record::LogRecord,
};

use super::{
    config::SharedSettings,
    connection::{Cancelled, ConnectionManager},
    queue::Pending,
};

pub struct SenderLoop {
    pub rx: Receiver<LogRecord>,
    pub connection: ConnectionManager,
    pub settings: SharedSettings,
    pub formatter: SharedFormatter,
    pub app_name: String,
    pub pending: Arc<Pending>,
    pub diagnostics: Diagnostics,
    /// Dropped when the loop exits so `close` can wait on it with a timeout.
    pub done: Sender<()>,
}

pub fn spawn_worker(sender: SenderLoop) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("logstash-hook-sender".into())
        .spawn(move || sender.run())
}

impl SenderLoop {
    fn run(mut self) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process_queue()));
        if let Err(payload) = outcome {
            self.diagnostics.error(format_args!(
                "sender loop panicked: {}",
                panic_message(payload.as_ref())
            ));
        }
        self.discard_remaining();
    }

    fn process_queue(&mut self) {
        if !self.connection.is_connected() && self.connection.connect().is_err() {
            return;
        }
        while let Ok(mut record) = self.rx.recv() {
            let outcome = self.process_record(&mut record);
            self.pending.complete();
            if outcome.is_err() {
                return;
            }
        }
    }

    /// Merge, format and send one record, then strip its hook-only fields.
    pub(crate) fn process_record(&mut self, record: &mut LogRecord) -> Result<(), Cancelled> {
        let (payload, prefix) = {
            let settings = self.settings.read();
            merge_static_fields(record, &settings.static_fields);
            let options = FormatOptions {
                app_name: &self.app_name,
                exclude_prefix: &settings.hook_only_prefix,
                time_format: settings.time_format.as_deref(),
            };
            (
                self.formatter.format(record, &options),
                settings.hook_only_prefix.clone(),
            )
        };
        let sent = match payload {
            Ok(bytes) => self.connection.write(&bytes),
            Err(err) => {
                self.diagnostics
                    .error(format_args!("unable to send the message: {err}"));
                Ok(())
            }
        };
        strip_prefixed_fields(&mut record.fields, &prefix);
        sent
    }

    fn discard_remaining(self) {
        let SenderLoop {
            rx,
            pending,
            diagnostics,
            done,
            ..
        } = self;
        let dropped = rx.try_iter().count();
        drop(rx);
        pending.clear();
        if dropped > 0 {
            diagnostics.warn(format_args!(
                "sender stopped; dropped {dropped} queued records"
            ));
        }
        diagnostics.debug(format_args!("the dispatch queue handler is closed"));
        drop(done);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}
