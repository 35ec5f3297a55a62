//! Prolog stream abstraction: text input, text output and random-access
//! binary streams.
//!
//! Each stream carries its filename atom, mode, type, end-of-stream state,
//! eof-action, reposition flag and alias set, and is identified by an opaque
//! handle term. Every operation first checks the stream's capability and
//! raises `permission_error` when it is invoked on a stream lacking it,
//! e.g. `get_char` on a binary stream or `put_char` on an input stream.
//!
//! End-of-stream transitions: `not` until a read first reaches EOF, then
//! `at`; the next read attempt moves to `past`. With eof-action `error` the
//! `at` to `past` transition raises; with `reset` the state loops back to
//! `not`.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::warn;

use super::error::PrologError;
use super::symbol::{atom, Atom};
use super::term::{Handle, Term};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum StreamMode {
    Read,
    Write,
    Append,
}

impl StreamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamMode::Read => "read",
            StreamMode::Write => "write",
            StreamMode::Append => "append",
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum StreamType {
    Text,
    Binary,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum EofAction {
    Error,
    EofCode,
    Reset,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum EofState {
    Not,
    At,
    Past,
}

/// Random-access backing for binary streams
pub trait BinaryBacking: Read + Write + Seek + Send {}
impl<T: Read + Write + Seek + Send> BinaryBacking for T {}

enum Backing {
    TextIn(Box<dyn BufRead + Send>),
    TextOut(Box<dyn Write + Send>),
    Binary(Box<dyn BinaryBacking>),
}

/// Shared byte sink so embedders and tests can read back what a text
/// output stream produced
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        SharedBuffer::default()
    }

    pub fn take_string(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct PrologStream {
    pub handle: Handle,
    pub name: Atom,
    pub mode: StreamMode,
    pub typ: StreamType,
    pub eof_action: EofAction,
    pub reposition: bool,
    pub aliases: Vec<Atom>,
    eof_state: EofState,
    peeked_char: Option<char>,
    peeked_byte: Option<u8>,
    /// Characters (text) or bytes (binary) consumed or emitted
    position: u64,
    backing: Backing,
}

fn io_fault(err: io::Error) -> PrologError {
    warn!(error = %err, "stream i/o fault");
    PrologError::system_error()
}

/// Decode one UTF-8 character from a byte source. Ill-formed input raises a
/// representation_error rather than looping.
fn read_utf8_char(r: &mut dyn BufRead) -> Result<Option<char>, PrologError> {
    let mut first = [0u8; 1];
    match r.read(&mut first) {
        Ok(0) => return Ok(None),
        Ok(_) => {}
        Err(e) => return Err(io_fault(e)),
    }
    let b = first[0];
    let extra = match b {
        0x00..=0x7f => return Ok(Some(b as char)),
        0xc0..=0xdf => 1,
        0xe0..=0xef => 2,
        0xf0..=0xf7 => 3,
        _ => return Err(PrologError::representation_error("character")),
    };
    let mut buf = [b, 0, 0, 0];
    let mut read = 0;
    while read < extra {
        let n = r
            .read(&mut buf[1 + read..1 + extra])
            .map_err(io_fault)?;
        if n == 0 {
            return Err(PrologError::representation_error("character"));
        }
        read += n;
    }
    std::str::from_utf8(&buf[..1 + extra])
        .ok()
        .and_then(|s| s.chars().next())
        .map(Some)
        .ok_or_else(|| PrologError::representation_error("character"))
}

impl PrologStream {
    pub fn eof_state(&self) -> EofState {
        self.eof_state
    }

    pub fn handle_term(&self) -> Term {
        Term::Handle(self.handle)
    }

    fn require(&self, want_input: bool, want_text: Option<StreamType>) -> Result<(), PrologError> {
        let is_input = self.mode == StreamMode::Read;
        // Repositionable binary streams are random-access: reads are allowed
        // even when the stream was opened for writing
        let direction_ok = want_input == is_input
            || (want_input && self.typ == StreamType::Binary && self.reposition);
        if !direction_ok {
            return Err(PrologError::permission_error(
                if want_input { "input" } else { "output" },
                "stream",
                self.handle_term(),
            ));
        }
        if let Some(t) = want_text {
            if self.typ != t {
                return Err(PrologError::permission_error(
                    if want_input { "input" } else { "output" },
                    match t {
                        StreamType::Text => "binary_stream",
                        StreamType::Binary => "text_stream",
                    },
                    self.handle_term(),
                ));
            }
        }
        Ok(())
    }

    /// Drive the eof-state machine before a read attempt. Returns true when
    /// the caller should report end-of-file without touching the backing.
    fn pre_read(&mut self) -> Result<bool, PrologError> {
        match self.eof_state {
            EofState::Not => Ok(false),
            EofState::At => match self.eof_action {
                EofAction::Error => {
                    self.eof_state = EofState::Past;
                    Err(PrologError::permission_error(
                        "input",
                        "past_end_of_stream",
                        self.handle_term(),
                    ))
                }
                EofAction::EofCode => {
                    self.eof_state = EofState::Past;
                    Ok(true)
                }
                EofAction::Reset => {
                    self.eof_state = EofState::Not;
                    Ok(false)
                }
            },
            EofState::Past => match self.eof_action {
                EofAction::Error => Err(PrologError::permission_error(
                    "input",
                    "past_end_of_stream",
                    self.handle_term(),
                )),
                EofAction::EofCode => Ok(true),
                EofAction::Reset => {
                    self.eof_state = EofState::Not;
                    Ok(false)
                }
            },
        }
    }

    /// Read one character; None reports end-of-file
    pub fn get_char(&mut self) -> Result<Option<char>, PrologError> {
        self.require(true, Some(StreamType::Text))?;
        if self.pre_read()? {
            return Ok(None);
        }
        if let Some(c) = self.peeked_char.take() {
            self.position += 1;
            return Ok(Some(c));
        }
        let backing = match &mut self.backing {
            Backing::TextIn(r) => r,
            _ => unreachable!("capability checked"),
        };
        match read_utf8_char(backing.as_mut())? {
            Some(c) => {
                self.position += 1;
                Ok(Some(c))
            }
            None => {
                self.eof_state = EofState::At;
                Ok(None)
            }
        }
    }

    /// Look at the next character without consuming it
    pub fn peek_char(&mut self) -> Result<Option<char>, PrologError> {
        self.require(true, Some(StreamType::Text))?;
        if self.eof_state == EofState::Past && self.eof_action == EofAction::Error {
            return Err(PrologError::permission_error(
                "input",
                "past_end_of_stream",
                self.handle_term(),
            ));
        }
        if let Some(c) = self.peeked_char {
            return Ok(Some(c));
        }
        if self.eof_state != EofState::Not {
            return Ok(None);
        }
        let backing = match &mut self.backing {
            Backing::TextIn(r) => r,
            _ => unreachable!("capability checked"),
        };
        match read_utf8_char(backing.as_mut())? {
            Some(c) => {
                self.peeked_char = Some(c);
                Ok(Some(c))
            }
            None => {
                self.eof_state = EofState::At;
                Ok(None)
            }
        }
    }

    pub fn put_char(&mut self, c: char) -> Result<(), PrologError> {
        self.require(false, Some(StreamType::Text))?;
        let mut buf = [0u8; 4];
        let s = c.encode_utf8(&mut buf);
        let backing = match &mut self.backing {
            Backing::TextOut(w) => w,
            _ => unreachable!("capability checked"),
        };
        backing.write_all(s.as_bytes()).map_err(io_fault)?;
        self.position += 1;
        Ok(())
    }

    pub fn put_str(&mut self, s: &str) -> Result<(), PrologError> {
        self.require(false, Some(StreamType::Text))?;
        let backing = match &mut self.backing {
            Backing::TextOut(w) => w,
            _ => unreachable!("capability checked"),
        };
        backing.write_all(s.as_bytes()).map_err(io_fault)?;
        self.position += s.chars().count() as u64;
        Ok(())
    }

    pub fn get_byte(&mut self) -> Result<Option<u8>, PrologError> {
        self.require(true, Some(StreamType::Binary))?;
        if self.pre_read()? {
            return Ok(None);
        }
        if let Some(b) = self.peeked_byte.take() {
            self.position += 1;
            return Ok(Some(b));
        }
        let backing = match &mut self.backing {
            Backing::Binary(r) => r,
            _ => unreachable!("capability checked"),
        };
        let mut buf = [0u8; 1];
        match backing.read(&mut buf) {
            Ok(0) => {
                self.eof_state = EofState::At;
                Ok(None)
            }
            Ok(_) => {
                self.position += 1;
                Ok(Some(buf[0]))
            }
            Err(e) => Err(io_fault(e)),
        }
    }

    pub fn peek_byte(&mut self) -> Result<Option<u8>, PrologError> {
        self.require(true, Some(StreamType::Binary))?;
        if self.eof_state == EofState::Past && self.eof_action == EofAction::Error {
            return Err(PrologError::permission_error(
                "input",
                "past_end_of_stream",
                self.handle_term(),
            ));
        }
        if let Some(b) = self.peeked_byte {
            return Ok(Some(b));
        }
        if self.eof_state != EofState::Not {
            return Ok(None);
        }
        let backing = match &mut self.backing {
            Backing::Binary(r) => r,
            _ => unreachable!("capability checked"),
        };
        let mut buf = [0u8; 1];
        match backing.read(&mut buf) {
            Ok(0) => {
                self.eof_state = EofState::At;
                Ok(None)
            }
            Ok(_) => {
                self.peeked_byte = Some(buf[0]);
                Ok(Some(buf[0]))
            }
            Err(e) => Err(io_fault(e)),
        }
    }

    pub fn put_byte(&mut self, b: u8) -> Result<(), PrologError> {
        match self.typ {
            StreamType::Binary => {}
            StreamType::Text => {
                return Err(PrologError::permission_error(
                    "output",
                    "text_stream",
                    self.handle_term(),
                ))
            }
        }
        if self.mode == StreamMode::Read {
            return Err(PrologError::permission_error(
                "output",
                "stream",
                self.handle_term(),
            ));
        }
        let backing = match &mut self.backing {
            Backing::Binary(w) => w,
            _ => unreachable!("capability checked"),
        };
        backing.write_all(&[b]).map_err(io_fault)?;
        self.position += 1;
        Ok(())
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn set_position(&mut self, pos: u64) -> Result<(), PrologError> {
        if !self.reposition {
            return Err(PrologError::permission_error(
                "reposition",
                "stream",
                self.handle_term(),
            ));
        }
        match &mut self.backing {
            Backing::Binary(f) => {
                f.seek(SeekFrom::Start(pos)).map_err(io_fault)?;
                self.position = pos;
                self.peeked_byte = None;
                self.eof_state = EofState::Not;
                Ok(())
            }
            _ => Err(PrologError::permission_error(
                "reposition",
                "stream",
                self.handle_term(),
            )),
        }
    }

    pub fn flush(&mut self) -> Result<(), PrologError> {
        match &mut self.backing {
            Backing::TextOut(w) => w.flush().map_err(io_fault),
            Backing::Binary(w) => w.flush().map_err(io_fault),
            Backing::TextIn(_) => Err(PrologError::permission_error(
                "output",
                "stream",
                self.handle_term(),
            )),
        }
    }
}

/// The environment's stream registry: handle table, alias table and the
/// current input/output selections
pub struct StreamTable {
    streams: DashMap<u64, Arc<Mutex<PrologStream>>>,
    aliases: DashMap<Atom, u64>,
    current_input: Mutex<u64>,
    current_output: Mutex<u64>,
    user_input: u64,
    user_output: u64,
}

impl StreamTable {
    pub fn new() -> Self {
        let stdin_stream = PrologStream {
            handle: Handle::fresh(),
            name: atom("user_input"),
            mode: StreamMode::Read,
            typ: StreamType::Text,
            eof_action: EofAction::Reset,
            reposition: false,
            aliases: vec![atom("user_input")],
            eof_state: EofState::Not,
            peeked_char: None,
            peeked_byte: None,
            position: 0,
            backing: Backing::TextIn(Box::new(BufReader::new(io::stdin()))),
        };
        let stdout_stream = PrologStream {
            handle: Handle::fresh(),
            name: atom("user_output"),
            mode: StreamMode::Write,
            typ: StreamType::Text,
            eof_action: EofAction::Reset,
            reposition: false,
            aliases: vec![atom("user_output")],
            eof_state: EofState::Not,
            peeked_char: None,
            peeked_byte: None,
            position: 0,
            backing: Backing::TextOut(Box::new(io::stdout())),
        };
        let user_input = stdin_stream.handle.id;
        let user_output = stdout_stream.handle.id;
        let table = StreamTable {
            streams: DashMap::new(),
            aliases: DashMap::new(),
            current_input: Mutex::new(user_input),
            current_output: Mutex::new(user_output),
            user_input,
            user_output,
        };
        table.register(stdin_stream);
        table.register(stdout_stream);
        table
    }

    fn register(&self, stream: PrologStream) -> Term {
        let id = stream.handle.id;
        let term = stream.handle_term();
        for alias in &stream.aliases {
            self.aliases.insert(*alias, id);
        }
        self.streams.insert(id, Arc::new(Mutex::new(stream)));
        term
    }

    /// Open a file stream. Binary streams are repositionable.
    pub fn open_file(
        &self,
        path: &Path,
        mode: StreamMode,
        typ: StreamType,
        eof_action: EofAction,
        aliases: Vec<Atom>,
    ) -> Result<Term, PrologError> {
        let name = atom(&path.display().to_string());
        let source_term = Term::Atom(name);
        let backing = match (typ, mode) {
            (StreamType::Text, StreamMode::Read) => {
                let f = File::open(path).map_err(|_| {
                    PrologError::existence_error("source_sink", source_term.clone())
                })?;
                Backing::TextIn(Box::new(BufReader::new(f)))
            }
            (StreamType::Text, StreamMode::Write) => {
                let f = File::create(path).map_err(|_| {
                    PrologError::permission_error("open", "source_sink", source_term.clone())
                })?;
                Backing::TextOut(Box::new(f))
            }
            (StreamType::Text, StreamMode::Append) => {
                let f = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|_| {
                        PrologError::permission_error("open", "source_sink", source_term.clone())
                    })?;
                Backing::TextOut(Box::new(f))
            }
            (StreamType::Binary, _) => {
                let mut opts = OpenOptions::new();
                match mode {
                    StreamMode::Read => opts.read(true),
                    StreamMode::Write => opts.read(true).write(true).create(true).truncate(true),
                    StreamMode::Append => opts.read(true).write(true).create(true),
                };
                let mut f = opts.open(path).map_err(|_| {
                    PrologError::existence_error("source_sink", source_term.clone())
                })?;
                if mode == StreamMode::Append {
                    f.seek(SeekFrom::End(0)).map_err(io_fault)?;
                }
                Backing::Binary(Box::new(f))
            }
        };
        let stream = PrologStream {
            handle: Handle::fresh(),
            name,
            mode,
            typ,
            eof_action,
            reposition: typ == StreamType::Binary,
            aliases,
            eof_state: EofState::Not,
            peeked_char: None,
            peeked_byte: None,
            position: 0,
            backing,
        };
        Ok(self.register(stream))
    }

    /// In-memory text input, used by embedders and tests
    pub fn open_string_input(&self, name: &str, text: &str) -> Term {
        let stream = PrologStream {
            handle: Handle::fresh(),
            name: atom(name),
            mode: StreamMode::Read,
            typ: StreamType::Text,
            eof_action: EofAction::EofCode,
            reposition: false,
            aliases: Vec::new(),
            eof_state: EofState::Not,
            peeked_char: None,
            peeked_byte: None,
            position: 0,
            backing: Backing::TextIn(Box::new(Cursor::new(text.as_bytes().to_vec()))),
        };
        self.register(stream)
    }

    /// In-memory text output; the returned buffer observes everything written
    pub fn open_string_output(&self, name: &str) -> (Term, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let stream = PrologStream {
            handle: Handle::fresh(),
            name: atom(name),
            mode: StreamMode::Write,
            typ: StreamType::Text,
            eof_action: EofAction::EofCode,
            reposition: false,
            aliases: Vec::new(),
            eof_state: EofState::Not,
            peeked_char: None,
            peeked_byte: None,
            position: 0,
            backing: Backing::TextOut(Box::new(buffer.clone())),
        };
        (self.register(stream), buffer)
    }

    /// In-memory binary stream with reposition support
    pub fn open_buffer_binary(&self, name: &str, contents: Vec<u8>) -> Term {
        let stream = PrologStream {
            handle: Handle::fresh(),
            name: atom(name),
            mode: StreamMode::Append,
            typ: StreamType::Binary,
            eof_action: EofAction::EofCode,
            reposition: true,
            aliases: Vec::new(),
            eof_state: EofState::Not,
            peeked_char: None,
            peeked_byte: None,
            position: 0,
            backing: Backing::Binary(Box::new(Cursor::new(contents))),
        };
        self.register(stream)
    }

    /// Resolve a stream term or alias atom
    pub fn resolve(&self, t: &Term) -> Result<Arc<Mutex<PrologStream>>, PrologError> {
        let t = t.deref();
        let id = match &t {
            Term::Var(_) => return Err(PrologError::instantiation()),
            Term::Handle(h) => h.id,
            Term::Atom(a) => match self.aliases.get(a) {
                Some(id) => *id,
                None => return Err(PrologError::existence_error("stream", t.clone())),
            },
            _ => {
                return Err(PrologError::domain_error("stream_or_alias", t.clone()));
            }
        };
        self.streams
            .get(&id)
            .map(|s| Arc::clone(&s))
            .ok_or_else(|| PrologError::existence_error("stream", t))
    }

    pub fn current_input(&self) -> Arc<Mutex<PrologStream>> {
        let id = *self.current_input.lock();
        Arc::clone(&self.streams.get(&id).expect("current input registered"))
    }

    pub fn current_output(&self) -> Arc<Mutex<PrologStream>> {
        let id = *self.current_output.lock();
        Arc::clone(&self.streams.get(&id).expect("current output registered"))
    }

    pub fn set_current_input(&self, t: &Term) -> Result<(), PrologError> {
        let stream = self.resolve(t)?;
        let s = stream.lock();
        if s.mode != StreamMode::Read {
            return Err(PrologError::permission_error(
                "input",
                "stream",
                s.handle_term(),
            ));
        }
        *self.current_input.lock() = s.handle.id;
        Ok(())
    }

    pub fn set_current_output(&self, t: &Term) -> Result<(), PrologError> {
        let stream = self.resolve(t)?;
        let s = stream.lock();
        if s.mode == StreamMode::Read {
            return Err(PrologError::permission_error(
                "output",
                "stream",
                s.handle_term(),
            ));
        }
        *self.current_output.lock() = s.handle.id;
        Ok(())
    }

    /// Close a stream: flush output, drop the backing, unregister aliases.
    /// Closing the standard streams is a no-op.
    pub fn close(&self, t: &Term) -> Result<(), PrologError> {
        let stream = self.resolve(t)?;
        let id = stream.lock().handle.id;
        if id == self.user_input || id == self.user_output {
            return Ok(());
        }
        {
            let mut s = stream.lock();
            if s.mode != StreamMode::Read {
                let _ = s.flush();
            }
            for alias in s.aliases.clone() {
                self.aliases.remove(&alias);
            }
        }
        // Closing the current input/output resets the selection
        {
            let mut ci = self.current_input.lock();
            if *ci == id {
                *ci = self.user_input;
            }
        }
        {
            let mut co = self.current_output.lock();
            if *co == id {
                *co = self.user_output;
            }
        }
        self.streams.remove(&id);
        Ok(())
    }

    /// Close every non-standard stream; used by halt/1 and teardown
    pub fn close_all(&self) {
        let ids: Vec<u64> = self
            .streams
            .iter()
            .map(|e| *e.key())
            .filter(|id| *id != self.user_input && *id != self.user_output)
            .collect();
        for id in ids {
            if let Some((_, stream)) = self.streams.remove(&id) {
                let mut s = stream.lock();
                if s.mode != StreamMode::Read {
                    let _ = s.flush();
                }
                for alias in s.aliases.clone() {
                    self.aliases.remove(&alias);
                }
            }
        }
    }
}

impl Default for StreamTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_input_reads_chars() {
        let table = StreamTable::new();
        let h = table.open_string_input("test", "ab");
        let stream = table.resolve(&h).unwrap();
        let mut s = stream.lock();
        assert_eq!(s.peek_char().unwrap(), Some('a'));
        assert_eq!(s.get_char().unwrap(), Some('a'));
        assert_eq!(s.get_char().unwrap(), Some('b'));
        assert_eq!(s.eof_state(), EofState::Not);
        assert_eq!(s.get_char().unwrap(), None);
        assert_eq!(s.eof_state(), EofState::At);
        assert_eq!(s.get_char().unwrap(), None, "eof_code keeps yielding eof");
        assert_eq!(s.eof_state(), EofState::Past);
    }

    #[test]
    fn test_eof_action_error_raises_past_end() {
        let table = StreamTable::new();
        let h = table.open_string_input("test", "");
        let stream = table.resolve(&h).unwrap();
        let mut s = stream.lock();
        s.eof_action = EofAction::Error;
        assert_eq!(s.get_char().unwrap(), None);
        let err = s.get_char().unwrap_err();
        assert!(format!("{}", err).contains("past_end_of_stream"));
    }

    #[test]
    fn test_eof_action_reset_loops_back() {
        let table = StreamTable::new();
        let h = table.open_string_input("test", "");
        let stream = table.resolve(&h).unwrap();
        let mut s = stream.lock();
        s.eof_action = EofAction::Reset;
        assert_eq!(s.get_char().unwrap(), None);
        assert_eq!(s.eof_state(), EofState::At);
        assert_eq!(s.get_char().unwrap(), None);
        assert_eq!(s.eof_state(), EofState::At, "reset re-enters not, then hits eof again");
    }

    #[test]
    fn test_capability_checks() {
        let table = StreamTable::new();
        let input = table.open_string_input("in", "x");
        let (output, _) = table.open_string_output("out");
        let s = table.resolve(&input).unwrap();
        let err = s.lock().put_char('y').unwrap_err();
        assert!(format!("{}", err).contains("permission_error"));
        let s = table.resolve(&output).unwrap();
        let err = s.lock().get_char().unwrap_err();
        assert!(format!("{}", err).contains("permission_error"));
        let err = s.lock().get_byte().unwrap_err();
        assert!(format!("{}", err).contains("permission_error"));
    }

    #[test]
    fn test_output_capture() {
        let table = StreamTable::new();
        let (h, buf) = table.open_string_output("out");
        let stream = table.resolve(&h).unwrap();
        stream.lock().put_str("hello").unwrap();
        stream.lock().put_char('!').unwrap();
        assert_eq!(buf.take_string(), "hello!");
        assert_eq!(stream.lock().position(), 6);
    }

    #[test]
    fn test_binary_reposition() {
        let table = StreamTable::new();
        let h = table.open_buffer_binary("bin", vec![10, 20, 30]);
        let stream = table.resolve(&h).unwrap();
        let mut s = stream.lock();
        assert_eq!(s.get_byte().unwrap(), Some(10));
        assert_eq!(s.get_byte().unwrap(), Some(20));
        s.set_position(0).unwrap();
        assert_eq!(s.get_byte().unwrap(), Some(10));
        assert_eq!(s.peek_byte().unwrap(), Some(20));
        assert_eq!(s.get_byte().unwrap(), Some(20));
    }

    #[test]
    fn test_alias_resolution_and_close() {
        let table = StreamTable::new();
        assert!(table.resolve(&Term::atom("user_input")).is_ok());
        assert!(table.resolve(&Term::atom("no_such_alias")).is_err());
        let h = table.open_string_input("tmp", "x");
        table.close(&h).unwrap();
        assert!(table.resolve(&h).is_err());
    }
}
