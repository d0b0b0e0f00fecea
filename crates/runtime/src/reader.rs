//! The Register-Machine Reader
//!
//! Parses one expression from the string in the `ReadSource` register into
//! the `Expression` register. Like the evaluator, the reader is a state
//! machine over the `Continue` register: nested lists suspend by saving
//! `ReadStack`/`Continue` and re-entering the dispatch, so every partially
//! read structure lives in heap data and survives the collections its own
//! allocations can trigger.
//!
//! The read cursor is a plain byte index into the source's contents; it is
//! not a heap reference, so a collection cannot invalidate it. The source
//! string itself is re-read through its register at every character.
//!
//! Syntax: lists `( ... )`, dotted pairs `(a . b)`, `'x` for `(quote x)`,
//! double-quoted strings with backslash escapes, `;` comments to end of
//! line, fixnums, real64s, and symbols for everything else.

use wisp_core::{ErrorCode, Heap, Register, Result, Tag, Value};

/// Reader steps, boxed into the `Continue` register as fixnums. The
/// reader and the evaluator never run interleaved, so they share the
/// register safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadStep {
    Done = 0,
    Dispatch = 1,
    List = 2,
    ListContinue = 3,
    EndOfDottedList = 4,
    QuotedObject = 5,
    QuotedObjectFinished = 6,
}

impl ReadStep {
    fn to_value(self) -> Value {
        Value::fixnum(self as i64)
    }

    fn from_value(value: Value) -> ReadStep {
        match value.as_fixnum() {
            0 => ReadStep::Done,
            1 => ReadStep::Dispatch,
            2 => ReadStep::List,
            3 => ReadStep::ListContinue,
            4 => ReadStep::EndOfDottedList,
            5 => ReadStep::QuotedObject,
            6 => ReadStep::QuotedObjectFinished,
            other => unreachable!("continue register holds no read step id: {other}"),
        }
    }
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C)
}

/// Characters that end a number or symbol token.
fn is_terminating(ch: u8) -> bool {
    is_whitespace(ch) || matches!(ch, b'(' | b')' | b'\'' | b';' | b'"' | 0)
}

/// A cursor over the source string in `ReadSource`.
///
/// One reader can parse several expressions in sequence from the same
/// source; the cursor keeps its position across [`Reader::read`] calls.
pub struct Reader {
    pos: usize,
}

impl Reader {
    pub fn new() -> Reader {
        Reader { pos: 0 }
    }

    /// Current byte offset into the source.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Read one expression into the `Expression` register.
    pub fn read(&mut self, heap: &mut Heap) -> Result<()> {
        heap.set_register(Register::Continue, ReadStep::Done.to_value());
        heap.set_register(Register::ReadStack, Value::NIL);
        let mut step = ReadStep::Dispatch;
        loop {
            step = match step {
                ReadStep::Done => return Ok(()),
                ReadStep::Dispatch => self.dispatch(heap)?,
                ReadStep::List => self.read_list(heap)?,
                ReadStep::ListContinue => self.read_list_continue(heap)?,
                ReadStep::EndOfDottedList => self.read_end_of_dotted_list(heap)?,
                ReadStep::QuotedObject => self.read_quoted(heap)?,
                ReadStep::QuotedObjectFinished => self.read_quoted_finished(heap)?,
            };
        }
    }

    /// Skip blanks and comments; true when only end-of-input remains.
    pub fn at_eof(&mut self, heap: &Heap) -> bool {
        self.discard_whitespace_and_comments(heap);
        let ch = self.read_char(heap);
        self.unread_char();
        ch == 0
    }

    // =========================================================================
    // Character input
    // =========================================================================

    /// The next source byte, or 0 at (and past) end of input. The string's
    /// own terminator doubles as the end-of-input sentinel.
    fn read_char(&mut self, heap: &Heap) -> u8 {
        let source = heap.get_register(Register::ReadSource);
        let byte = if self.pos < heap.blob_len(source) {
            heap.blob_byte(source, self.pos)
        } else {
            0
        };
        self.pos += 1;
        byte
    }

    fn unread_char(&mut self) {
        self.pos -= 1;
    }

    fn continue_step(&self, heap: &Heap) -> ReadStep {
        ReadStep::from_value(heap.get_register(Register::Continue))
    }

    /// Consume through the end of the comment line, leaving any newline
    /// consumed and end-of-input unconsumed.
    fn discard_comment(&mut self, heap: &Heap) {
        loop {
            let ch = self.read_char(heap);
            if ch == 0 {
                self.unread_char();
                return;
            }
            if ch == b'\n' {
                return;
            }
        }
    }

    fn discard_whitespace_and_comments(&mut self, heap: &Heap) {
        loop {
            let ch = self.read_char(heap);
            if ch == b';' {
                self.discard_comment(heap);
            } else if !is_whitespace(ch) {
                self.unread_char();
                return;
            }
        }
    }

    // =========================================================================
    // Steps
    // =========================================================================

    fn dispatch(&mut self, heap: &mut Heap) -> Result<ReadStep> {
        self.discard_whitespace_and_comments(heap);
        let ch = self.read_char(heap);
        match ch {
            b'(' => Ok(ReadStep::List),
            b'\'' => Ok(ReadStep::QuotedObject),
            b'"' => self.read_string(heap),
            0 => Err(ErrorCode::ReadUnexpectedEof),
            b')' => Err(ErrorCode::ReadUnmatchedListClose),
            _ => {
                self.unread_char();
                self.read_number_or_symbol(heap)
            }
        }
    }

    fn read_list(&mut self, heap: &mut Heap) -> Result<ReadStep> {
        self.discard_whitespace_and_comments(heap);
        let ch = self.read_char(heap);
        if ch == b')' {
            heap.set_register(Register::Expression, Value::NIL);
            return Ok(self.continue_step(heap));
        }
        self.unread_char();

        heap.save(Register::ReadStack)?;
        heap.set_register(Register::ReadStack, Value::NIL);
        heap.save(Register::Continue)?;
        heap.set_register(Register::Continue, ReadStep::ListContinue.to_value());
        Ok(ReadStep::Dispatch)
    }

    /// An element of the current list has just been read into
    /// `Expression`.
    fn read_list_continue(&mut self, heap: &mut Heap) -> Result<ReadStep> {
        self.push_expression_onto_read_stack(heap)?;

        self.discard_whitespace_and_comments(heap);
        let ch = self.read_char(heap);
        if ch == b')' {
            // End of list: elements were pushed in reverse.
            let stack = heap.get_register(Register::ReadStack);
            let list = heap.reverse_in_place(stack, Value::NIL);
            heap.set_register(Register::Expression, list);
            heap.restore(Register::Continue);
            heap.restore(Register::ReadStack);
            return Ok(self.continue_step(heap));
        }
        if ch == b'.' {
            // Pair separator, or the start of a number/symbol?
            let next_ch = self.read_char(heap);
            if is_whitespace(next_ch) {
                heap.set_register(Register::Continue, ReadStep::EndOfDottedList.to_value());
                return Ok(ReadStep::Dispatch);
            }
            if next_ch == 0 {
                return Err(ErrorCode::ReadUnterminatedPair);
            }
            self.unread_char();
            self.unread_char();
            return Ok(ReadStep::Dispatch);
        }
        // Another element.
        self.unread_char();
        Ok(ReadStep::Dispatch)
    }

    /// The expression after the dot has been read.
    fn read_end_of_dotted_list(&mut self, heap: &mut Heap) -> Result<ReadStep> {
        let stack = heap.get_register(Register::ReadStack);
        let tail = heap.get_register(Register::Expression);
        let list = heap.reverse_in_place(stack, tail);
        heap.set_register(Register::Expression, list);

        self.discard_whitespace_and_comments(heap);
        let ch = self.read_char(heap);
        if ch != b')' {
            return Err(ErrorCode::ReadDottedListExpectedClose);
        }
        heap.restore(Register::Continue);
        heap.restore(Register::ReadStack);
        Ok(self.continue_step(heap))
    }

    fn read_quoted(&mut self, heap: &mut Heap) -> Result<ReadStep> {
        heap.save(Register::Continue)?;
        heap.set_register(Register::Continue, ReadStep::QuotedObjectFinished.to_value());
        Ok(ReadStep::Dispatch)
    }

    /// Wrap the freshly read expression as `(quote <expression>)`.
    fn read_quoted_finished(&mut self, heap: &mut Heap) -> Result<ReadStep> {
        // Reserve both pairs up front so neither allocation can collect
        // between the splices.
        heap.ensure_capacity(4)?;
        let tail = heap.allocate_pair()?;
        let text = heap.get_register(Register::Expression);
        heap.set_car(tail, text);

        let quoted = heap.allocate_pair()?;
        let quote = heap.find_symbol("quote");
        debug_assert!(quote.is_symbol(), "\"quote\" must be interned before reading");
        heap.set_car(quoted, quote);
        heap.set_cdr(quoted, tail);
        heap.set_register(Register::Expression, quoted);

        heap.restore(Register::Continue);
        Ok(self.continue_step(heap))
    }

    /// Opening quote already consumed. Scans once to size the blob, then
    /// copies the contents with escapes resolved: `\x` stands for `x`
    /// itself, so `\"` and `\\` embed quotes and backslashes.
    fn read_string(&mut self, heap: &mut Heap) -> Result<ReadStep> {
        let start = self.pos;
        let mut length = 0usize;
        loop {
            let ch = self.read_char(heap);
            match ch {
                b'"' => break,
                0 => return Err(ErrorCode::ReadUnterminatedString),
                b'\\' => {
                    if self.read_char(heap) == 0 {
                        return Err(ErrorCode::ReadUnterminatedString);
                    }
                    length += 1;
                }
                _ => length += 1,
            }
        }

        let bytes = heap.allocate_byte_vector(length + 1)?;
        // No allocation below, so the source reference stays put.
        let source = heap.get_register(Register::ReadSource);
        let mut out = 0usize;
        let mut i = start;
        loop {
            let mut ch = heap.blob_byte(source, i);
            i += 1;
            if ch == b'"' {
                break;
            }
            if ch == b'\\' {
                ch = heap.blob_byte(source, i);
                i += 1;
            }
            heap.byte_vector_set(bytes, out, ch)?;
            out += 1;
        }
        // The terminator byte is already zero.
        heap.set_register(Register::Expression, bytes.retag(Tag::String));
        Ok(self.continue_step(heap))
    }

    fn read_number_or_symbol(&mut self, heap: &mut Heap) -> Result<ReadStep> {
        let start = self.pos;
        loop {
            let ch = self.read_char(heap);
            if is_terminating(ch) {
                self.unread_char();
                break;
            }
        }

        // Copy the token bytes out to host memory; a byte copy, not a
        // reference, so interning below cannot invalidate it.
        let source = heap.get_register(Register::ReadSource);
        let bytes: Vec<u8> = (start..self.pos).map(|i| heap.blob_byte(source, i)).collect();
        let token = String::from_utf8_lossy(&bytes).into_owned();

        if token == "." {
            return Err(ErrorCode::ReadInvalidPairSeparator);
        }
        // The three singleton literals, spelled the way the printer
        // spells them.
        match token.as_str() {
            "nil" => {
                heap.set_register(Register::Expression, Value::NIL);
                return Ok(self.continue_step(heap));
            }
            "true" => {
                heap.set_register(Register::Expression, Value::TRUE);
                return Ok(self.continue_step(heap));
            }
            "false" => {
                heap.set_register(Register::Expression, Value::FALSE);
                return Ok(self.continue_step(heap));
            }
            _ => {}
        }
        if is_integer(&token) {
            if let Ok(n) = token.parse::<i64>() {
                heap.set_register(Register::Expression, Value::fixnum(n));
                return Ok(self.continue_step(heap));
            }
            // Magnitude beyond i64: falls through and reads as a real.
        }
        if is_integer(&token) || is_real(&token) {
            if let Ok(f) = token.parse::<f64>() {
                heap.set_register(Register::Expression, Value::real64(f));
                return Ok(self.continue_step(heap));
            }
        }

        let symbol = heap.intern(&token)?;
        heap.set_register(Register::Expression, symbol);
        Ok(self.continue_step(heap))
    }

    fn push_expression_onto_read_stack(&mut self, heap: &mut Heap) -> Result<()> {
        let pair = heap.allocate_pair()?;
        let expr = heap.get_register(Register::Expression);
        let stack = heap.get_register(Register::ReadStack);
        heap.set_car(pair, expr);
        heap.set_cdr(pair, stack);
        heap.set_register(Register::ReadStack, pair);
        Ok(())
    }
}

impl Default for Reader {
    fn default() -> Self {
        Reader::new()
    }
}

// =============================================================================
// Token grammar
// =============================================================================
//
// integer := [sign] digit+
// real    := [sign] digit* '.' digit+ [exponent]
//          | [sign] digit+ '.' digit* [exponent]
//          | [sign] digit+ exponent
// exponent := (e | E) [sign] digit+
//
// Anything else is a symbol.

fn eat_sign(s: &mut &[u8]) {
    if let [b'+' | b'-', rest @ ..] = *s {
        *s = rest;
    }
}

fn eat_digits(s: &mut &[u8]) -> usize {
    let mut count = 0;
    while let [b'0'..=b'9', rest @ ..] = *s {
        *s = rest;
        count += 1;
    }
    count
}

fn eat_exponent(s: &mut &[u8]) -> bool {
    if let [b'e' | b'E', rest @ ..] = *s {
        *s = rest;
        eat_sign(s);
        eat_digits(s) > 0
    } else {
        false
    }
}

fn is_integer(token: &str) -> bool {
    let mut s = token.as_bytes();
    eat_sign(&mut s);
    eat_digits(&mut s) > 0 && s.is_empty()
}

fn is_real(token: &str) -> bool {
    let mut s = token.as_bytes();
    eat_sign(&mut s);
    let whole_digits = eat_digits(&mut s);
    if whole_digits == 0 {
        // .5  .25e3  — a leading dot needs fraction digits or an exponent.
        if s.first() != Some(&b'.') {
            return false;
        }
        s = &s[1..];
        let fraction_digits = eat_digits(&mut s);
        if s.is_empty() {
            return fraction_digits > 0;
        }
        return eat_exponent(&mut s) && s.is_empty();
    }
    if s.is_empty() {
        return false; // plain integer
    }
    if s.first() == Some(&b'.') {
        s = &s[1..];
        eat_digits(&mut s);
        if s.is_empty() {
            return true;
        }
        return eat_exponent(&mut s) && s.is_empty();
    }
    eat_exponent(&mut s) && s.is_empty()
}
