//! Mock sinks and writers for observing pipeline output

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use swtrigger::pipeline::{DataSink, Message, PipelineResult};

/// `Write` target whose contents stay readable after the writer moved
/// into an element thread.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink keeping every message it is sent.
#[derive(Clone, Default)]
pub struct CollectingSink {
    messages: Arc<Mutex<Vec<Message>>>,
    connected: Arc<Mutex<bool>>,
}

impl CollectingSink {
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.lock().unwrap()
    }
}

impl DataSink for CollectingSink {
    fn connect(&mut self) -> PipelineResult<()> {
        *self.connected.lock().unwrap() = true;
        Ok(())
    }

    fn disconnect(&mut self) -> PipelineResult<()> {
        *self.connected.lock().unwrap() = false;
        Ok(())
    }

    fn send(&mut self, msg: Message) -> PipelineResult<()> {
        self.messages.lock().unwrap().push(msg);
        Ok(())
    }
}
