//! Object Printing
//!
//! Renders heap values back into surface syntax: lists in parentheses,
//! strings quoted, symbols bare. `format_value` follows references;
//! `format_reference` stays one level deep and is what collection traces
//! use, since following references mid-collection would read moved
//! objects.

use crate::heap::Heap;
use crate::value::{Tag, Value};

impl Heap {
    /// Render a value, following references.
    pub fn format_value(&self, value: Value) -> String {
        let mut out = String::new();
        self.write_value(&mut out, value);
        out
    }

    fn write_value(&self, out: &mut String, value: Value) {
        if value.is_real64() {
            out.push_str(&format_real64(value.as_real64()));
            return;
        }
        match value.tag() {
            Tag::Nil => out.push_str("nil"),
            Tag::True => out.push_str("true"),
            Tag::False => out.push_str("false"),
            Tag::Fixnum => out.push_str(&value.as_fixnum().to_string()),
            Tag::Real32 => {
                out.push_str(&format!("{}f", value.as_real32()));
            }
            Tag::Primitive => {
                out.push_str(&format!("#primitive({})", value.primitive_index()));
            }
            Tag::Pair => self.write_list(out, value),
            Tag::String => {
                out.push('"');
                for ch in self.blob_string(value).chars() {
                    match ch {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        _ => out.push(ch),
                    }
                }
                out.push('"');
            }
            Tag::Symbol => out.push_str(&self.blob_string(value)),
            Tag::Vector => {
                out.push_str("(vector");
                for i in 0..self.vector_length(value) {
                    out.push(' ');
                    self.write_value(out, self.vector_slot(value, i));
                }
                out.push(')');
            }
            Tag::ByteVector => {
                out.push_str("(byte-vector");
                for i in 0..self.blob_len(value) {
                    out.push_str(&format!(" 0x{:x}", self.blob_byte(value, i)));
                }
                out.push(')');
            }
            Tag::Procedure => out.push_str("#procedure"),
            Tag::BrokenHeart | Tag::BlobHeader => {
                // Never reachable outside a collection.
                out.push_str(&format!("{value:?}"));
            }
        }
    }

    fn write_list(&self, out: &mut String, pair: Value) {
        out.push('(');
        self.write_value(out, self.car(pair));
        let mut rest = self.cdr(pair);
        loop {
            if rest.is_pair() {
                out.push(' ');
                self.write_value(out, self.car(rest));
                rest = self.cdr(rest);
            } else if rest.is_nil() {
                break;
            } else {
                out.push_str(" . ");
                self.write_value(out, rest);
                break;
            }
        }
        out.push(')');
    }

    /// Render a value one level deep, without following references.
    pub fn format_reference(&self, value: Value) -> String {
        if value.is_real64() {
            return format_real64(value.as_real64());
        }
        match value.tag() {
            Tag::Nil => "nil".to_string(),
            Tag::True => "true".to_string(),
            Tag::False => "false".to_string(),
            Tag::Fixnum => value.as_fixnum().to_string(),
            Tag::Real32 => format!("{}f", value.as_real32()),
            Tag::Primitive => format!("#primitive({})", value.primitive_index()),
            Tag::Pair => format!("<Pair {}>", value.reference()),
            Tag::Vector => format!("<Vector {}>", value.reference()),
            Tag::ByteVector => format!("<ByteVector {}>", value.reference()),
            Tag::String => format!("<String {}>", value.reference()),
            Tag::Symbol => format!("<Symbol {}>", value.reference()),
            Tag::Procedure => format!("<Procedure {}>", value.reference()),
            Tag::BrokenHeart => format!("<BrokenHeart {}>", value.payload()),
            Tag::BlobHeader => format!("<BlobHeader {}>", value.payload()),
        }
    }
}

/// Doubles always print with a decimal point or exponent, so they read
/// back as reals rather than fixnums.
fn format_real64(f: f64) -> String {
    let s = f.to_string();
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{s}.0")
    }
}
