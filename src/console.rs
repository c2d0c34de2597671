use std::collections::VecDeque;
use std::io::{self, BufWriter, IsTerminal, Read, Write};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal,
};
use log::error;

/// Host console, as seen by traps and the keyboard device registers.
///
/// Output may be buffered until [`Console::flush`].
pub trait Console {
    /// Return a pending key without waiting, if there is one.
    fn poll_key(&mut self) -> Option<u8>;
    /// Block until a byte of input is available.
    ///
    /// `None` if host input is exhausted.
    fn read_byte(&mut self) -> Option<u8>;
    fn write_byte(&mut self, byte: u8);
    fn flush(&mut self);
}

/// Source of terminal events.
trait Events {
    /// Next event, or `None` if `wait` is unset and no event is ready.
    fn next(&mut self, wait: bool) -> io::Result<Option<Event>>;
}

struct CrosstermEvents;

impl Events for CrosstermEvents {
    fn next(&mut self, wait: bool) -> io::Result<Option<Event>> {
        if !wait && !event::poll(Duration::ZERO)? {
            return Ok(None);
        }
        event::read().map(Some)
    }
}

/// Similar to [`crossterm::event::KeyCode`] but only contains relevant information.
#[derive(Debug, PartialEq, Eq)]
enum Key {
    Char(char),
    /// `Ctrl+C`
    Interrupt,
}

/// Console backed by the process' stdin and stdout.
///
/// When stdin is an interactive terminal, the terminal stays in raw mode until this is dropped,
/// and every key (polled or waited for) is read from the same event queue.
pub struct Terminal {
    out: BufWriter<Box<dyn Write>>,
    /// `None` if stdin is not a terminal.
    events: Option<Box<dyn Events>>,
    /// Whether raw mode was entered, and must be left on drop.
    raw: bool,
    /// Raw mode does not translate `\n` for a terminal stdout.
    crlf: bool,
    /// Remaining bytes of a multi-byte character.
    pending: VecDeque<u8>,
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal {
    pub fn new() -> Self {
        let mut events: Option<Box<dyn Events>> = None;
        if io::stdin().is_terminal() {
            match terminal::enable_raw_mode() {
                Ok(()) => events = Some(Box::new(CrosstermEvents)),
                Err(e) => error!("failed to enable raw terminal: {e}"),
            }
        }
        let raw = events.is_some();
        Self {
            out: BufWriter::new(Box::new(io::stdout())),
            events,
            raw,
            crlf: raw && io::stdout().is_terminal(),
            pending: VecDeque::new(),
        }
    }

    fn queue_char(&mut self, ch: char) -> Option<u8> {
        let mut bytes = [0u8; 4];
        let mut bytes = ch.encode_utf8(&mut bytes).bytes();
        let first = bytes.next();
        self.pending.extend(bytes);
        first
    }

    // Pipes never wait indefinitely, so a poll can just read
    fn read_piped() -> Option<u8> {
        let mut buf = [0; 1];
        match io::stdin().read(&mut buf) {
            Ok(0) => None,
            Ok(_) => Some(buf[0]),
            Err(e) => {
                error!("failed to read stdin: {e}");
                None
            }
        }
    }

    /// Read the next key from the event queue.
    ///
    /// Returns `None` if not waiting and no key is ready, or if the terminal fails.
    fn next_key(&mut self, wait: bool) -> Option<u8> {
        if let Some(byte) = self.pending.pop_front() {
            return Some(byte);
        }
        if self.events.is_none() {
            return Self::read_piped();
        }
        let ch = loop {
            let next = match self.events.as_mut() {
                Some(events) => events.next(wait),
                None => return None,
            };
            let event = match next {
                Ok(Some(event)) => event,
                Ok(None) => return None,
                Err(e) => {
                    error!("failed to read terminal event: {e}");
                    return None;
                }
            };
            match Key::try_from(event) {
                Ok(Key::Char(ch)) => break ch,
                Ok(Key::Interrupt) => self.interrupt(),
                Err(()) => continue,
            }
        };
        self.queue_char(ch)
    }

    /// Flush output and leave raw mode, if it was entered.
    fn restore(&mut self) {
        self.flush();
        if self.raw {
            if let Err(e) = terminal::disable_raw_mode() {
                error!("failed to disable raw terminal: {e}");
            }
            self.raw = false;
        }
    }

    /// Restore the terminal and exit.
    fn interrupt(&mut self) -> ! {
        self.restore();
        println!();
        std::process::exit(130);
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.restore();
    }
}

impl TryFrom<Event> for Key {
    type Error = ();
    fn try_from(event: Event) -> Result<Self, Self::Error> {
        match event {
            Event::Key(event) => event.try_into(),
            _ => Err(()),
        }
    }
}

impl TryFrom<KeyEvent> for Key {
    type Error = ();
    fn try_from(event: KeyEvent) -> Result<Self, Self::Error> {
        if matches!(event.kind, KeyEventKind::Release) {
            return Err(());
        }
        let ch = match (event.modifiers, event.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c')) => return Ok(Key::Interrupt),
            (_, KeyCode::Enter) => '\n',
            (_, KeyCode::Backspace) => '\x08',
            (_, KeyCode::Tab) => '\t',
            (_, KeyCode::Esc) => '\x1b',
            (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(ch)) => ch,
            _ => return Err(()),
        };
        Ok(Key::Char(ch))
    }
}

impl Console for Terminal {
    fn poll_key(&mut self) -> Option<u8> {
        self.next_key(false)
    }

    fn read_byte(&mut self) -> Option<u8> {
        // Prompts must be visible before blocking
        self.flush();
        self.next_key(true)
    }

    fn write_byte(&mut self, byte: u8) {
        let res = if self.crlf && byte == b'\n' {
            self.out.write_all(b"\r\n")
        } else {
            self.out.write_all(&[byte])
        };
        if let Err(e) = res {
            error!("failed to write to stdout: {e}");
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.out.flush() {
            error!("failed to flush stdout: {e}");
        }
    }
}

/// In-memory console with queued input and captured output.
#[derive(Debug, Default)]
pub struct Buffered {
    input: VecDeque<u8>,
    output: Vec<u8>,
    flushes: usize,
}

impl Buffered {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: impl AsRef<[u8]>) -> Self {
        let mut console = Self::new();
        console.push_input(input);
        console
    }

    pub fn push_input(&mut self, input: impl AsRef<[u8]>) {
        self.input.extend(input.as_ref());
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Amount of times output has been flushed.
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl Console for Buffered {
    fn poll_key(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn write_byte(&mut self, byte: u8) {
        self.output.push(byte);
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

impl<C: Console + ?Sized> Console for &mut C {
    fn poll_key(&mut self) -> Option<u8> {
        (**self).poll_key()
    }

    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn write_byte(&mut self, byte: u8) {
        (**self).write_byte(byte)
    }

    fn flush(&mut self) {
        (**self).flush()
    }
}
