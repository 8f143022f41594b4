//! Process-wide output sinks with capture points
//!
//! Test bodies route printable output through [`out`] and [`err`] instead
//! of the process streams so an embedder can capture it. A [`Capture`]
//! guard attaches a buffer to a sink: the first attached buffer receives
//! everything written until its guard drops, later buffers wait their
//! turn, and with no buffer attached writes pass through to the real
//! stream.

use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy)]
enum SinkKind {
    Out,
    Err,
}

type Buffer = Arc<Mutex<String>>;

/// One redirectable output stream
#[derive(Debug)]
pub struct Sink {
    kind: SinkKind,
    queue: Mutex<Vec<Buffer>>,
}

impl Sink {
    /// Write text to the holding capture buffer, or the real stream
    pub fn write(&self, text: &str) {
        let queue = self.queue.lock().expect("stream sink lock poisoned");
        if let Some(holder) = queue.first() {
            holder
                .lock()
                .expect("stream capture lock poisoned")
                .push_str(text);
        } else {
            drop(queue);
            match self.kind {
                SinkKind::Out => print!("{}", text),
                SinkKind::Err => eprint!("{}", text),
            }
        }
    }

    /// Write text followed by a newline
    pub fn write_line(&self, text: &str) {
        let queue = self.queue.lock().expect("stream sink lock poisoned");
        if let Some(holder) = queue.first() {
            let mut buffer = holder.lock().expect("stream capture lock poisoned");
            buffer.push_str(text);
            buffer.push('\n');
        } else {
            drop(queue);
            match self.kind {
                SinkKind::Out => println!("{}", text),
                SinkKind::Err => eprintln!("{}", text),
            }
        }
    }

    fn attach(&'static self) -> Capture {
        let buffer = Arc::new(Mutex::new(String::new()));
        self.queue
            .lock()
            .expect("stream sink lock poisoned")
            .push(Arc::clone(&buffer));
        Capture { sink: self, buffer }
    }
}

static OUT: Sink = Sink {
    kind: SinkKind::Out,
    queue: Mutex::new(Vec::new()),
};

static ERR: Sink = Sink {
    kind: SinkKind::Err,
    queue: Mutex::new(Vec::new()),
};

/// The test-output sink
pub fn out() -> &'static Sink {
    &OUT
}

/// The test-error sink
pub fn err() -> &'static Sink {
    &ERR
}

/// RAII capture of one sink
///
/// Dropping the guard detaches its buffer; if the buffer held the sink,
/// the next waiting capture takes over.
#[derive(Debug)]
pub struct Capture {
    sink: &'static Sink,
    buffer: Buffer,
}

impl Capture {
    /// Capture the test-output sink
    pub fn out() -> Capture {
        OUT.attach()
    }

    /// Capture the test-error sink
    pub fn err() -> Capture {
        ERR.attach()
    }

    /// Text accumulated so far
    pub fn text(&self) -> String {
        self.buffer
            .lock()
            .expect("stream capture lock poisoned")
            .clone()
    }

    /// Detach and return the accumulated text
    pub fn finish(self) -> String {
        self.buffer
            .lock()
            .expect("stream capture lock poisoned")
            .clone()
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        let mut queue = self.sink.queue.lock().expect("stream sink lock poisoned");
        if let Some(pos) = queue.iter().position(|b| Arc::ptr_eq(b, &self.buffer)) {
            queue.remove(pos);
        }
    }
}
