use std::collections::VecDeque;
use std::io::{self, IsTerminal, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers as Mod},
    terminal,
};

use signal_hook::SigId;

use crate::output::Output;

/// How long a raw-mode read waits for a key before checking for signals.
const SIGNAL_POLL: Duration = Duration::from_millis(100);

/// Console device seen by trap routines and the keyboard registers.
pub trait Io {
    /// Block until one byte of input is available.
    ///
    /// An interrupt from the operator is reported as [`io::ErrorKind::Interrupted`].
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Return a byte of input if one is ready, without waiting for a key press.
    ///
    /// `None` means no key is ready. Devices which cannot tell "no key yet"
    /// apart from "more input coming", such as a pipe, may wait for the next
    /// byte instead and report end of input as `None`.
    fn poll_byte(&mut self) -> io::Result<Option<u8>>;

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Report a pending operator interrupt.
    ///
    /// Called periodically while the machine runs without reading input.
    fn check_interrupt(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Termination signals caught while the terminal is in raw mode.
///
/// The default action of these signals would end the process without
/// restoring the terminal, so they only raise a flag which the machine
/// reports as an interrupt.
pub struct TerminationSignals {
    received: Arc<AtomicBool>,
    ids: Vec<SigId>,
}

impl TerminationSignals {
    #[cfg(unix)]
    const SIGNALS: &'static [i32] = &[
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGHUP,
        signal_hook::consts::SIGQUIT,
        signal_hook::consts::SIGINT,
    ];
    #[cfg(not(unix))]
    const SIGNALS: &'static [i32] = &[signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT];

    pub fn register() -> io::Result<Self> {
        let received = Arc::new(AtomicBool::new(false));
        let mut signals = Self {
            received,
            ids: Vec::with_capacity(Self::SIGNALS.len()),
        };
        for &signal in Self::SIGNALS {
            // Already registered handlers are removed by drop on failure
            let id = signal_hook::flag::register(signal, Arc::clone(&signals.received))?;
            signals.ids.push(id);
        }
        Ok(signals)
    }

    pub fn received(&self) -> bool {
        self.received.load(Ordering::Relaxed)
    }

    fn check(&self) -> io::Result<()> {
        if self.received() {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "terminated by signal"));
        }
        Ok(())
    }
}

impl Drop for TerminationSignals {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

/// Holds the terminal in raw mode for as long as it is alive.
///
/// Raw mode is released on drop, which covers normal halts, faults,
/// interrupts, termination signals and unwinding.
pub struct RawModeGuard {
    signals: TerminationSignals,
}

impl RawModeGuard {
    /// Must only be called if terminal is NOT in raw mode.
    pub fn acquire() -> io::Result<Self> {
        debug_assert!(
            !terminal::is_raw_mode_enabled().is_ok_and(|is| is),
            "terminal should not be in raw mode to enable raw mode",
        );
        let signals = TerminationSignals::register()?;
        terminal::enable_raw_mode()?;
        Output::set_raw(true);
        Ok(Self { signals })
    }

    /// Fail with [`io::ErrorKind::Interrupted`] once a termination signal arrived.
    pub fn check_signals(&self) -> io::Result<()> {
        self.signals.check()
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Nothing useful can be done if the terminal refuses to be restored
        let _ = terminal::disable_raw_mode();
        Output::set_raw(false);
    }
}

/// Process stdin/stdout.
///
/// If stdin is an interactive terminal it is placed in raw mode, so keys are
/// delivered unbuffered and without echo.
pub struct TerminalIo {
    raw: Option<RawModeGuard>,
    /// Bytes of keys already read from the terminal but not yet consumed
    pending: VecDeque<u8>,
}

impl TerminalIo {
    pub fn new() -> io::Result<Self> {
        let raw = if io::stdin().is_terminal() {
            Some(RawModeGuard::acquire()?)
        } else {
            None
        };
        Ok(Self {
            raw,
            pending: VecDeque::new(),
        })
    }

    pub fn is_raw(&self) -> bool {
        self.raw.is_some()
    }

    /// Queue the bytes of a key event.
    ///
    /// Returns `true` if anything was queued.
    fn queue_event(&mut self, event: Event) -> io::Result<bool> {
        let Event::Key(key) = event else {
            return Ok(false);
        };
        let before = self.pending.len();
        key_bytes(key, &mut self.pending)?;
        Ok(self.pending.len() > before)
    }

    /// Drain every event which is ready without blocking.
    fn drain_events(&mut self) -> io::Result<()> {
        while event::poll(Duration::ZERO)? {
            let event = event::read()?;
            self.queue_event(event)?;
        }
        Ok(())
    }

    fn check_signals(&self) -> io::Result<()> {
        match &self.raw {
            Some(raw) => raw.check_signals(),
            None => Ok(()),
        }
    }

    fn read_stdin() -> io::Result<Option<u8>> {
        let mut buf = [0; 1];
        match io::stdin().read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }
}

impl Io for TerminalIo {
    fn read_byte(&mut self) -> io::Result<u8> {
        if let Some(byte) = self.pending.pop_front() {
            return Ok(byte);
        }
        if !self.is_raw() {
            return Self::read_stdin()?.ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "end of console input")
            });
        }
        loop {
            self.check_signals()?;
            if !event::poll(SIGNAL_POLL)? {
                continue;
            }
            let event = event::read()?;
            if self.queue_event(event)? {
                if let Some(byte) = self.pending.pop_front() {
                    return Ok(byte);
                }
            }
        }
    }

    /// Piped stdin has no way to tell that no byte is ready yet, so this waits
    /// for the next byte and returns `None` only at end of input.
    fn poll_byte(&mut self) -> io::Result<Option<u8>> {
        if self.pending.is_empty() {
            if self.is_raw() {
                self.drain_events()?;
            } else {
                return Self::read_stdin();
            }
        }
        Ok(self.pending.pop_front())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        if !self.is_raw() {
            return stdout.write_all(bytes);
        }
        // Raw mode disables output processing, so restore the carriage return
        for line in bytes.split_inclusive(|&b| b == b'\n') {
            match line.split_last() {
                Some((&b'\n', rest)) => {
                    stdout.write_all(rest)?;
                    stdout.write_all(b"\r\n")?;
                }
                _ => stdout.write_all(line)?,
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }

    fn check_interrupt(&mut self) -> io::Result<()> {
        if self.is_raw() {
            self.check_signals()?;
            self.drain_events()?;
        }
        Ok(())
    }
}

/// Convert a key press into the bytes a program would read for it.
///
/// Multi-byte characters are queued as their UTF-8 encoding.
/// `Ctrl+C` is reported as an interrupt.
fn key_bytes(event: KeyEvent, queue: &mut VecDeque<u8>) -> io::Result<()> {
    if matches!(event.kind, KeyEventKind::Release) {
        return Ok(());
    }

    match (event.modifiers, event.code) {
        (Mod::CONTROL, KeyCode::Char('c')) => {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
        }
        // Other control chords map onto ASCII control codes
        (Mod::CONTROL, KeyCode::Char(ch)) if ch.is_ascii_alphabetic() => {
            queue.push_back(ch.to_ascii_lowercase() as u8 & 0x1f);
        }

        (_, KeyCode::Enter) => queue.push_back(b'\n'),
        (_, KeyCode::Backspace) => queue.push_back(0x08),
        (_, KeyCode::Tab) => queue.push_back(b'\t'),
        (_, KeyCode::Esc) => queue.push_back(0x1b),
        (_, KeyCode::Delete) => queue.push_back(0x7f),

        (Mod::NONE | Mod::SHIFT, KeyCode::Char(ch)) => {
            let mut bytes = [0u8; 4];
            queue.extend(ch.encode_utf8(&mut bytes).bytes());
        }

        _ => (),
    }
    Ok(())
}

/// In-memory console, for tests and for embedding the machine.
#[derive(Debug, Default)]
pub struct BufferIo {
    input: VecDeque<u8>,
    output: Vec<u8>,
    interrupt: bool,
}

impl BufferIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: impl AsRef<[u8]>) -> Self {
        Self {
            input: input.as_ref().iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Report an interrupt at the next read or interrupt check.
    pub fn interrupt(&mut self) {
        self.interrupt = true;
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    fn take_interrupt(&mut self) -> io::Result<()> {
        if std::mem::take(&mut self.interrupt) {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
        }
        Ok(())
    }
}

impl Io for BufferIo {
    fn read_byte(&mut self) -> io::Result<u8> {
        self.take_interrupt()?;
        self.input
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "end of console input"))
    }

    fn poll_byte(&mut self) -> io::Result<Option<u8>> {
        self.take_interrupt()?;
        Ok(self.input.pop_front())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn check_interrupt(&mut self) -> io::Result<()> {
        self.take_interrupt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(modifiers: Mod, code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn bytes_of(event: KeyEvent) -> io::Result<Vec<u8>> {
        let mut queue = VecDeque::new();
        key_bytes(event, &mut queue)?;
        Ok(queue.into_iter().collect())
    }

    #[test]
    fn plain_keys() {
        assert_eq!(bytes_of(press(Mod::NONE, KeyCode::Char('a'))).unwrap(), b"a");
        assert_eq!(bytes_of(press(Mod::SHIFT, KeyCode::Char('A'))).unwrap(), b"A");
        assert_eq!(bytes_of(press(Mod::NONE, KeyCode::Enter)).unwrap(), b"\n");
        assert_eq!(bytes_of(press(Mod::NONE, KeyCode::Backspace)).unwrap(), [0x08]);
        assert_eq!(bytes_of(press(Mod::NONE, KeyCode::Left)).unwrap(), b"");
    }

    #[test]
    fn multi_byte_characters_are_queued_as_utf8() {
        assert_eq!(
            bytes_of(press(Mod::NONE, KeyCode::Char('é'))).unwrap(),
            "é".as_bytes()
        );
    }

    #[test]
    fn control_chords() {
        assert_eq!(bytes_of(press(Mod::CONTROL, KeyCode::Char('d'))).unwrap(), [0x04]);
        let err = bytes_of(press(Mod::CONTROL, KeyCode::Char('c'))).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
    }

    #[test]
    fn releases_are_ignored() {
        let mut event = press(Mod::NONE, KeyCode::Char('x'));
        event.kind = KeyEventKind::Release;
        assert_eq!(bytes_of(event).unwrap(), b"");
    }

    #[test]
    fn buffer_io() {
        let mut io = BufferIo::with_input("hi");
        assert_eq!(io.read_byte().unwrap(), b'h');
        assert_eq!(io.poll_byte().unwrap(), Some(b'i'));
        assert_eq!(io.poll_byte().unwrap(), None);
        assert_eq!(
            io.read_byte().unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );

        io.write_bytes(b"out").unwrap();
        assert_eq!(io.output_str(), "out");

        io.interrupt();
        assert_eq!(
            io.check_interrupt().unwrap_err().kind(),
            io::ErrorKind::Interrupted
        );
        assert!(io.check_interrupt().is_ok());
    }

    #[test]
    #[cfg(unix)]
    fn termination_signal_raises_flag() {
        let signals = TerminationSignals::register().unwrap();
        assert!(!signals.received());
        assert!(signals.check().is_ok());

        signal_hook::low_level::raise(signal_hook::consts::SIGTERM).unwrap();
        assert!(signals.received());
        assert_eq!(
            signals.check().unwrap_err().kind(),
            io::ErrorKind::Interrupted
        );
    }
}
