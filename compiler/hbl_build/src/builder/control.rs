//! Control-flow constructs.
//!
//! Loops lay out as
//!
//! ```text
//! [init] [cond: jump body / past] [body] [increment] [jump back to cond]
//! ```
//!
//! and `do`-`while` drops the leading check in favour of a trailing
//! conditional jump to the top. `break` and `continue` sites are recorded as
//! [`LoopExit`]s during the body build and patched once the loop length is
//! known.

use hbl_ir::{Command, Jump, Keyword};
use hbl_segment::{extract_conditions, next_statement, Conditions, SourceCursor};

use super::{block_body, Builder, Frame, LoopExit};
use crate::BuildError;

/// The fragments of a loop header.
struct LoopParts<'a> {
    init: Option<&'a str>,
    condition: Option<&'a str>,
    increment: Option<&'a str>,
    body: &'a str,
    /// `false` for `do`-`while`: the condition is tested after the body.
    test_first: bool,
}

fn non_empty(piece: Option<&String>) -> Option<&str> {
    piece.map(String::as_str).filter(|p| !p.is_empty())
}

pub(super) fn loop_exit(
    frame: &mut Frame,
    text: &str,
    keyword: Keyword,
    exits: Option<&mut Vec<LoopExit>>,
) -> Result<(), BuildError> {
    let Some(exits) = exits else {
        return Err(BuildError::OutsideLoop(text.to_string()));
    };
    let at = frame.list.push(Command::placeholder(text));
    exits.push(if keyword == Keyword::Break {
        LoopExit::Break(at)
    } else {
        LoopExit::Continue(at)
    });
    Ok(())
}

impl Builder<'_> {
    pub(super) fn build_for(
        &mut self,
        frame: &mut Frame,
        text: &str,
        header: &Conditions,
    ) -> Result<(), BuildError> {
        let parts = LoopParts {
            init: non_empty(header.pieces.first()),
            condition: non_empty(header.pieces.get(1)),
            increment: non_empty(header.pieces.get(2)),
            body: block_body(&text[header.rest_offset(text)..]),
            test_first: true,
        };
        self.build_loop(frame, text, &parts)
    }

    pub(super) fn build_while(
        &mut self,
        frame: &mut Frame,
        text: &str,
        header: &Conditions,
    ) -> Result<(), BuildError> {
        let parts = LoopParts {
            init: None,
            condition: non_empty(header.pieces.first()),
            increment: None,
            body: block_body(&text[header.rest_offset(text)..]),
            test_first: true,
        };
        self.build_loop(frame, text, &parts)
    }

    /// `do{body}while(cond)`; the segmenter keeps both halves in one
    /// statement.
    pub(super) fn build_do_while(&mut self, frame: &mut Frame, text: &str) -> Result<(), BuildError> {
        let Some(close) = text.rfind('}') else {
            return Err(BuildError::MissingWhile);
        };
        let clause = &text[close + 1..];
        if !clause.starts_with("while(") {
            return Err(BuildError::MissingWhile);
        }
        let pieces = extract_conditions(clause, "while(".len(), ',', true);
        if pieces.len() != 1 {
            return Err(BuildError::MalformedDoWhile);
        }
        let parts = LoopParts {
            init: None,
            condition: non_empty(pieces.pieces.first()),
            increment: None,
            body: block_body(&text["do".len()..=close]),
            test_first: false,
        };
        self.build_loop(frame, text, &parts)
    }

    fn build_loop(
        &mut self,
        frame: &mut Frame,
        text: &str,
        parts: &LoopParts<'_>,
    ) -> Result<(), BuildError> {
        let beginning = frame.list.len();
        let laid_out = self.lay_out_loop(frame, text, parts);
        if laid_out.is_err() {
            frame.list.truncate(beginning);
        }
        laid_out
    }

    fn lay_out_loop(
        &mut self,
        frame: &mut Frame,
        text: &str,
        parts: &LoopParts<'_>,
    ) -> Result<(), BuildError> {
        if let Some(init) = parts.init {
            self.build_into(frame, init, None)?;
        }

        let top = frame.list.len();
        if parts.test_first && parts.condition.is_some() {
            frame.list.push(Command::placeholder(text));
        }

        let mut exits = Vec::new();
        self.build_into(frame, parts.body, Some(&mut exits))?;

        let increment_start = frame.list.len();
        if let Some(increment) = parts.increment {
            self.build_into(frame, increment, None)?;
        }
        let has_increment = frame.list.len() > increment_start;

        let back = frame.list.len();
        let resume = if parts.test_first {
            frame.list.push(Command::jump(Jump::to(top), text));
            let past = frame.list.len();
            if let (Some(condition), Some(check)) = (parts.condition, frame.list.command_mut(top)) {
                check.make_jump(Some(condition.to_string()), top + 1, past);
            }
            if has_increment {
                increment_start
            } else {
                back
            }
        } else {
            let jump = Jump {
                condition: parts.condition.map(str::to_string),
                on_true: top,
                on_false: back + 1,
            };
            frame.list.push(Command::jump(jump, text));
            back
        };

        let past = frame.list.len();
        for exit in exits {
            let (at, target) = match exit {
                LoopExit::Break(at) => (at, past),
                LoopExit::Continue(at) => (at, resume),
            };
            if let Some(site) = frame.list.command_mut(at) {
                site.make_jump(None, target, target);
            }
        }
        Ok(())
    }

    pub(super) fn build_if(
        &mut self,
        frame: &mut Frame,
        text: &str,
        mut exits: Option<&mut Vec<LoopExit>>,
    ) -> Result<(), BuildError> {
        let header = extract_conditions(text, "if(".len(), ',', true);
        let [condition] = header.pieces.as_slice() else {
            return Err(BuildError::IfHeader);
        };

        let beginning = frame.list.len();
        frame.last_if.push(beginning);
        let depth = frame.last_if.len();
        frame.list.push(Command::placeholder(text));

        let mut rest = SourceCursor::new(&text[header.rest_offset(text)..]);
        let then = next_statement(&mut rest)?;
        if let Err(err) = self.build_into(frame, &then, exits.as_deref_mut()) {
            frame.list.truncate(beginning);
            frame.last_if.truncate(depth - 1);
            return Err(err);
        }

        let past = frame.list.len();
        if let Some(jump) = frame.list.command_mut(beginning) {
            jump.make_jump(Some(condition.clone()), beginning + 1, past);
        }
        // ifs opened inside the branch can no longer take an else
        frame.last_if.truncate(depth);

        self.build_into(frame, rest.remaining(), exits)
    }

    /// Latch an `else` onto the innermost open `if`: the `if` now falls to
    /// the else branch, and the end of its then branch jumps past it.
    pub(super) fn build_else(
        &mut self,
        frame: &mut Frame,
        text: &str,
        exits: Option<&mut Vec<LoopExit>>,
    ) -> Result<(), BuildError> {
        let Some(&latched) = frame.last_if.last() else {
            return Err(BuildError::ElseWithoutIf);
        };
        // An `if` forming the else branch must stay latchable for a
        // following `else`, so the latched entry goes before the build.
        frame.last_if.pop();

        let skip = frame.list.push(Command::placeholder(text));
        let body = block_body(text["else".len()..].trim_start());
        self.build_into(frame, body, exits)?;

        let past = frame.list.len();
        let on_true = frame
            .list
            .command(latched)
            .and_then(Command::as_jump)
            .map(|jump| jump.on_true)
            .ok_or(BuildError::IfScoping)?;
        if let Some(jump) = frame.list.command_mut(latched) {
            jump.make_jump(None, on_true, skip + 1);
        }
        if let Some(jump) = frame.list.command_mut(skip) {
            jump.make_jump(None, past, past);
        }
        Ok(())
    }
}

