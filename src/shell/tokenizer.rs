//! Quote-aware shell lexing and segmentation.
//!
//! A command line is cut into [`Segment`]s, one per simple command. Operators
//! (`&&`, `||`, `|`, `|&`, `&`, `;`, newline) end a segment; redirections and
//! their targets are dropped. Heredoc bodies and here-strings are kept on the
//! segment whose standard input they feed. Command
//! substitutions (`$(...)`, backticks, `<(...)`, `>(...)`) are lexed
//! recursively and their segments are emitted before the segment that
//! contains them, since the shell runs them first.

use thiserror::Error;

/// Maximum nesting of command substitutions inside one command line.
const MAX_SUBSTITUTION_DEPTH: usize = 32;

/// One simple command from a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Literal source text of the segment, trimmed.
    pub text: String,
    /// Words with quoting removed.
    pub tokens: Vec<String>,
    /// Heredoc bodies and here-strings fed to the command, in order.
    pub stdin: Vec<String>,
    opaque: bool,
}

impl Segment {
    fn opaque(command: &str) -> Self {
        Self {
            text: command.trim().to_string(),
            tokens: vec![command.to_string()],
            stdin: Vec::new(),
            opaque: true,
        }
    }

    /// True when the command line could not be lexed and this segment holds
    /// the whole original text as a single token.
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }
}

/// Why a command line could not be lexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unterminated quote")]
    UnterminatedQuote,

    #[error("unbalanced command substitution")]
    UnbalancedSubstitution,

    #[error("command substitution nested deeper than {MAX_SUBSTITUTION_DEPTH} levels")]
    NestingTooDeep,
}

/// Split a command line into segments.
///
/// Never fails: input that cannot be lexed yields a single opaque segment.
pub fn segment(command: &str) -> Vec<Segment> {
    match try_segment(command) {
        Ok(segments) => segments,
        Err(err) => {
            tracing::trace!(%err, "command line treated as opaque");
            vec![Segment::opaque(command)]
        }
    }
}

/// Split a command line into segments, reporting lexing failures.
pub fn try_segment(command: &str) -> Result<Vec<Segment>, ParseError> {
    Lexer::new(command, 0).run()
}

/// Words of every segment of `input`, in order.
pub fn tokenize(input: &str) -> Vec<String> {
    segment(input).into_iter().flat_map(|s| s.tokens).collect()
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
    out: Vec<Segment>,
    /// Segments of substitutions found in the current segment.
    pending: Vec<Segment>,
    tokens: Vec<String>,
    word: Vec<u8>,
    in_word: bool,
    seg_start: usize,
    /// The next word is a redirection target.
    redirect_target: bool,
    /// The next word is a heredoc delimiter; `true` for `<<-`.
    heredoc_delim: Option<bool>,
    /// Heredocs whose bodies start after the next newline.
    heredocs: Vec<Heredoc>,
    /// The next word is a here-string.
    herestring: bool,
    /// Here-strings of the current segment.
    stdin: Vec<String>,
}

struct Heredoc {
    delim: String,
    strip_tabs: bool,
    /// Index in `out` of the segment reading the body, once it is closed.
    owner: Option<usize>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, depth: usize) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            depth,
            out: Vec::new(),
            pending: Vec::new(),
            tokens: Vec::new(),
            word: Vec::new(),
            in_word: false,
            seg_start: 0,
            redirect_target: false,
            heredoc_delim: None,
            heredocs: Vec::new(),
            herestring: false,
            stdin: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Segment>, ParseError> {
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b' ' | b'\t' | b'\r' => {
                    self.finish_word();
                    self.pos += 1;
                }
                b'\n' => {
                    let at = self.pos;
                    self.pos += 1;
                    self.close_segment(at);
                    self.read_heredoc_bodies();
                }
                b'\\' => self.escape(),
                b'\'' => self.single_quoted()?,
                b'"' => self.double_quoted()?,
                b'`' => self.backtick()?,
                b'$' => self.dollar()?,
                b'#' if !self.in_word => self.comment(),
                b';' => self.operator(1),
                b'&' => self.ampersand(),
                b'|' => {
                    let len = if matches!(self.peek(1), Some(b'|' | b'&')) { 2 } else { 1 };
                    self.operator(len);
                }
                b'<' | b'>' => self.angle()?,
                b'(' | b')' => {
                    self.finish_word();
                    self.tokens.push(char::from(b).to_string());
                    self.pos += 1;
                }
                _ => {
                    self.push_byte(b);
                    self.pos += 1;
                }
            }
        }
        let end = self.bytes.len();
        self.close_segment(end);
        Ok(self.out)
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn push_byte(&mut self, b: u8) {
        self.word.push(b);
        self.in_word = true;
    }

    fn push_str(&mut self, s: &str) {
        self.word.extend_from_slice(s.as_bytes());
        self.in_word = true;
    }

    fn finish_word(&mut self) {
        if !self.in_word {
            return;
        }
        let word = String::from_utf8_lossy(&self.word).into_owned();
        self.word.clear();
        self.in_word = false;

        if let Some(strip_tabs) = self.heredoc_delim.take() {
            self.heredocs.push(Heredoc {
                delim: word,
                strip_tabs,
                owner: None,
            });
        } else if self.herestring {
            self.herestring = false;
            self.stdin.push(word);
        } else if self.redirect_target {
            self.redirect_target = false;
        } else {
            self.tokens.push(word);
        }
    }

    fn operator(&mut self, len: usize) {
        let at = self.pos;
        self.pos += len;
        self.close_segment(at);
    }

    fn close_segment(&mut self, end: usize) {
        self.finish_word();
        self.redirect_target = false;
        self.heredoc_delim = None;
        self.herestring = false;

        let mut tokens = std::mem::take(&mut self.tokens);
        let stdin = std::mem::take(&mut self.stdin);
        strip_grouping(&mut tokens);
        self.out.append(&mut self.pending);
        if !tokens.is_empty() {
            let text = self.src.get(self.seg_start..end).unwrap_or_default().trim();
            self.out.push(Segment {
                text: text.to_string(),
                tokens,
                stdin,
                opaque: false,
            });
            let index = self.out.len() - 1;
            for heredoc in self.heredocs.iter_mut().filter(|h| h.owner.is_none()) {
                heredoc.owner = Some(index);
            }
        }
        self.seg_start = self.pos;
    }

    fn escape(&mut self) {
        match self.peek(1) {
            // Line continuation.
            Some(b'\n') => self.pos += 2,
            Some(next) => {
                self.push_byte(next);
                self.pos += 2;
            }
            None => {
                self.push_byte(b'\\');
                self.pos += 1;
            }
        }
    }

    fn single_quoted(&mut self) -> Result<(), ParseError> {
        let src = self.src;
        let start = self.pos + 1;
        let len = src[start..].find('\'').ok_or(ParseError::UnterminatedQuote)?;
        self.push_str(&src[start..start + len]);
        self.pos = start + len + 1;
        Ok(())
    }

    fn double_quoted(&mut self) -> Result<(), ParseError> {
        self.pos += 1;
        self.in_word = true;
        loop {
            let b = self.peek(0).ok_or(ParseError::UnterminatedQuote)?;
            match b {
                b'"' => {
                    self.pos += 1;
                    return Ok(());
                }
                b'\\' => match self.peek(1) {
                    Some(next @ (b'$' | b'`' | b'"' | b'\\')) => {
                        self.push_byte(next);
                        self.pos += 2;
                    }
                    Some(b'\n') => self.pos += 2,
                    _ => {
                        self.push_byte(b'\\');
                        self.pos += 1;
                    }
                },
                b'$' if self.peek(1) == Some(b'(') => self.substitution()?,
                b'`' => self.backtick()?,
                _ => {
                    self.push_byte(b);
                    self.pos += 1;
                }
            }
        }
    }

    fn ansi_c_quoted(&mut self) -> Result<(), ParseError> {
        self.pos += 2;
        self.in_word = true;
        loop {
            let b = self.peek(0).ok_or(ParseError::UnterminatedQuote)?;
            match b {
                b'\'' => {
                    self.pos += 1;
                    return Ok(());
                }
                b'\\' => {
                    let next = self.peek(1).ok_or(ParseError::UnterminatedQuote)?;
                    match next {
                        b'n' => self.push_byte(b'\n'),
                        b't' => self.push_byte(b'\t'),
                        b'r' => self.push_byte(b'\r'),
                        b'\'' | b'"' | b'\\' | b'?' => self.push_byte(next),
                        _ => {
                            self.push_byte(b'\\');
                            self.push_byte(next);
                        }
                    }
                    self.pos += 2;
                }
                _ => {
                    self.push_byte(b);
                    self.pos += 1;
                }
            }
        }
    }

    fn dollar(&mut self) -> Result<(), ParseError> {
        match self.peek(1) {
            Some(b'\'') => self.ansi_c_quoted(),
            Some(b'(') => self.substitution(),
            _ => {
                self.push_byte(b'$');
                self.pos += 1;
                Ok(())
            }
        }
    }

    /// Lex `$(...)`, `<(...)` or `>(...)` starting at the current position.
    fn substitution(&mut self) -> Result<(), ParseError> {
        let src = self.src;
        let open = self.pos;
        let body = open + 2;
        let close = matching_paren(self.bytes, body)?;
        let inner = self.nested(&src[body..close])?;
        self.pending.extend(inner);
        self.push_str(&src[open..=close]);
        self.pos = close + 1;
        Ok(())
    }

    fn backtick(&mut self) -> Result<(), ParseError> {
        let src = self.src;
        let start = self.pos + 1;
        let mut i = start;
        let end = loop {
            match self.bytes.get(i) {
                None => return Err(ParseError::UnterminatedQuote),
                Some(b'\\') => i += 2,
                Some(b'`') => break i,
                Some(_) => i += 1,
            }
        };
        let inner = src[start..end].replace("\\`", "`");
        let segments = self.nested(&inner)?;
        self.pending.extend(segments);
        self.push_str(&src[self.pos..=end]);
        self.pos = end + 1;
        Ok(())
    }

    fn nested(&self, inner: &str) -> Result<Vec<Segment>, ParseError> {
        if self.depth + 1 > MAX_SUBSTITUTION_DEPTH {
            return Err(ParseError::NestingTooDeep);
        }
        Lexer::new(inner, self.depth + 1).run()
    }

    fn comment(&mut self) {
        while let Some(b) = self.peek(0) {
            if b == b'\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn ampersand(&mut self) {
        match self.peek(1) {
            Some(b'&') => self.operator(2),
            // `&>file` and `&>>file` redirect both streams.
            Some(b'>') => {
                self.finish_word();
                self.pos += if self.peek(2) == Some(b'>') { 3 } else { 2 };
                self.redirect_target = true;
            }
            _ => self.operator(1),
        }
    }

    fn angle(&mut self) -> Result<(), ParseError> {
        if self.peek(1) == Some(b'(') {
            return self.substitution();
        }

        // A word made only of digits right before the operator is a file
        // descriptor, not an argument.
        if self.in_word && !self.word.is_empty() && self.word.iter().all(u8::is_ascii_digit) {
            self.word.clear();
            self.in_word = false;
        } else {
            self.finish_word();
        }

        let first = self.bytes[self.pos];
        let second = self.peek(1);
        let third = self.peek(2);
        let len = match (first, second, third) {
            (b'<', Some(b'<'), Some(b'<')) => {
                self.herestring = true;
                3
            }
            (b'<', Some(b'<'), Some(b'-')) => {
                self.heredoc_delim = Some(true);
                3
            }
            (b'<', Some(b'<'), _) => {
                self.heredoc_delim = Some(false);
                2
            }
            (b'<', Some(b'&' | b'>'), _) => 2,
            (b'>', Some(b'>' | b'&' | b'|'), _) => 2,
            _ => 1,
        };
        if self.heredoc_delim.is_none() && !self.herestring {
            self.redirect_target = true;
        }
        self.pos += len;
        Ok(())
    }

    /// Consume the bodies of pending heredocs and attach them to the
    /// segments that read them.
    fn read_heredoc_bodies(&mut self) {
        let src = self.src;
        for heredoc in std::mem::take(&mut self.heredocs) {
            let mut body = Vec::new();
            while self.pos < self.bytes.len() {
                let rest = &src[self.pos..];
                let line_len = rest.find('\n').unwrap_or(rest.len());
                let line = &rest[..line_len];
                self.pos = (self.pos + line_len + 1).min(self.bytes.len());
                let line = if heredoc.strip_tabs { line.trim_start_matches('\t') } else { line };
                if line == heredoc.delim {
                    break;
                }
                body.push(line);
            }
            if let Some(segment) = heredoc.owner.and_then(|i| self.out.get_mut(i)) {
                segment.stdin.push(body.join("\n"));
            }
        }
        self.seg_start = self.pos;
    }
}

/// Index of the `)` closing a substitution whose body starts at `start`.
fn matching_paren(bytes: &[u8], start: usize) -> Result<usize, ParseError> {
    let mut depth = 1usize;
    let mut i = start;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'\\' => i += 1,
            b'\'' => {
                i += 1;
                while bytes.get(i).is_some_and(|&c| c != b'\'') {
                    i += 1;
                }
            }
            b'"' => {
                i += 1;
                while let Some(&c) = bytes.get(i) {
                    match c {
                        b'\\' => i += 1,
                        b'"' => break,
                        _ => {}
                    }
                    i += 1;
                }
            }
            b'`' => {
                i += 1;
                while let Some(&c) = bytes.get(i) {
                    match c {
                        b'\\' => i += 1,
                        b'`' => break,
                        _ => {}
                    }
                    i += 1;
                }
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(ParseError::UnbalancedSubstitution)
}

/// Drop subshell and group punctuation around a simple command.
fn strip_grouping(tokens: &mut Vec<String>) {
    let lead = tokens
        .iter()
        .take_while(|t| matches!(t.as_str(), "(" | "{" | "!"))
        .count();
    tokens.drain(..lead);
    while matches!(tokens.last().map(String::as_str), Some(")" | "}")) {
        tokens.pop();
    }
}
