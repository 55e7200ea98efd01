//! Request dispatcher: the blocking verb loop.
//!
//! One request at a time: read a verb line, drive the parser synchronously,
//! write the response, flush, loop. The only suspension point is the blocking
//! read between requests, so no locking exists anywhere. Request order is
//! response order.

mod wire;

pub use wire::ProtocolError;

use std::io::{BufRead, Write};

use tracing::debug;

use crate::locate;
use crate::parser::Parser;
use crate::project::Registry;
use crate::session::{self, Session};

enum Flow {
    Continue,
    Shutdown,
}

/// The whole server: the parser library, the single-file session the process
/// was started for, and the multi-file project registry.
pub struct Server<P: Parser> {
    parser: P,
    session: Session<P>,
    registry: Registry<P>,
}

impl<P: Parser> Server<P> {
    /// Stand up the server: the session parses `filename` immediately so the
    /// first completion request hits a warm translation unit.
    pub fn new(parser: P, filename: String, args: Vec<String>) -> Self {
        let session = Session::new(&parser, filename, args);
        Server {
            parser,
            session,
            registry: Registry::new(),
        }
    }

    /// Serve requests until SHUTDOWN or end of input.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> anyhow::Result<()> {
        loop {
            let verb = match wire::read_line(input) {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => return Err(e.into()),
            };
            if verb.is_empty() {
                continue;
            }
            match self.handle(&verb, input, output) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Shutdown) => {
                    debug!("shutdown requested");
                    break;
                }
                // The client is gone; nothing left to answer to.
                Err(ProtocolError::Io(e)) => return Err(e.into()),
                Err(e) => {
                    writeln!(output, "{e}")?;
                    wire::end_response(output)?;
                }
            }
        }
        Ok(())
    }

    fn handle<R: BufRead, W: Write>(
        &mut self,
        verb: &str,
        input: &mut R,
        output: &mut W,
    ) -> Result<Flow, ProtocolError> {
        debug!(verb, "request");
        match verb {
            "COMPLETION" => self.do_completion(input, output)?,
            "REPARSE" => {
                self.session.reparse(&self.parser);
            }
            "SOURCEFILE" => self.do_sourcefile(input)?,
            "CMDLINEARGS" => self.do_cmdline_args(input)?,
            "FILECHANGED" => self.do_file_changed(input)?,
            "SYNTAXCHECK" => self.do_syntax_check(input, output)?,
            "LOCATE" => self.do_locate(input, output)?,
            "PROJECT" => self.do_project(input, output)?,
            "SHUTDOWN" => return Ok(Flow::Shutdown),
            other => return Err(ProtocolError::UnknownVerb(other.to_string())),
        }
        Ok(Flow::Continue)
    }

    fn do_completion<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<(), ProtocolError> {
        let line = wire::read_number_field(input, "row")? as u32;
        let column = wire::read_number_field(input, "column")? as u32;
        let prefix = wire::read_field(input, "prefix")?;
        let len = wire::read_number_field(input, "source_length")?;
        self.session.buffer_mut().fill_from(input, len)?;

        let results = self.session.complete(&self.parser, line, column);
        session::write_completions(&results, &prefix, output)?;
        wire::end_response(output)?;
        Ok(())
    }

    fn do_sourcefile<R: BufRead>(&mut self, input: &mut R) -> Result<(), ProtocolError> {
        let len = wire::read_number_field(input, "source_length")?;
        self.session.buffer_mut().fill_from(input, len)?;
        Ok(())
    }

    fn do_cmdline_args<R: BufRead>(&mut self, input: &mut R) -> Result<(), ProtocolError> {
        let count = wire::read_number_field(input, "num_args")?;
        let args = wire::read_args(input, count)?;
        self.session.set_args(&self.parser, args);
        Ok(())
    }

    fn do_file_changed<R: BufRead>(&mut self, input: &mut R) -> Result<(), ProtocolError> {
        let filename = wire::read_field(input, "filename")?;
        let count = wire::read_number_field(input, "num_args")?;
        let args = wire::read_args(input, count)?;
        self.session.retarget(&self.parser, filename, args);
        Ok(())
    }

    fn do_syntax_check<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<(), ProtocolError> {
        let len = wire::read_number_field(input, "source_length")?;
        self.session.buffer_mut().fill_from(input, len)?;
        self.session.reparse(&self.parser);
        for diagnostic in self.session.diagnostics(&self.parser) {
            writeln!(output, "{diagnostic}")?;
        }
        wire::end_response(output)?;
        Ok(())
    }

    fn do_locate<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<(), ProtocolError> {
        let line = wire::read_number_field(input, "row")? as u32;
        let column = wire::read_number_field(input, "column")? as u32;
        let _prefix = wire::read_field(input, "prefix")?;
        let len = wire::read_number_field(input, "source_length")?;
        self.session.buffer_mut().fill_from(input, len)?;
        self.session.reparse(&self.parser);

        let loc = self.session.locate_at(&self.parser, line, column);
        let file = loc
            .file
            .map(|f| self.parser.file_name(f))
            .unwrap_or_default();
        writeln!(output, "LOCATE:")?;
        writeln!(output, "file:{file}")?;
        writeln!(output, "line:{}", loc.line)?;
        writeln!(output, "column:{}", loc.column)?;
        wire::end_response(output)?;
        Ok(())
    }

    fn do_project<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<(), ProtocolError> {
        let subcmd = wire::require_line(input)?;
        debug!(%subcmd, "PROJECT request");
        match subcmd.as_str() {
            "NEW" => {
                let id = self.registry.create(&self.parser)?;
                writeln!(output, "PROJECTID:{id}")?;
            }
            "FIND_ID" => {
                let path = wire::require_line(input)?;
                let id = match self.registry.find_id(&path) {
                    Some(id) => id as i64,
                    None => -1,
                };
                writeln!(output, "PROJECTID:{id}")?;
            }
            "ADD_SRC" => {
                let id = wire::read_number_field(input, "PROJECTID")?;
                let path = wire::require_line(input)?;
                let project = self.registry.get_mut(id)?;
                if !project.add_source(&self.parser, &path) {
                    writeln!(output, "translation unit creation failed")?;
                }
            }
            "OPTIONS" => {
                let id = wire::read_number_field(input, "PROJECTID")?;
                let args_line = wire::require_line(input)?;
                let args = args_line.split_whitespace().map(str::to_string).collect();
                self.registry.get_mut(id)?.set_args(args);
            }
            "FILE_SRC" => {
                let id = wire::read_number_field(input, "PROJECTID")?;
                let path = wire::read_field(input, "file")?;
                let len = wire::read_number_field(input, "source_length")?;
                let mut contents = vec![0u8; len];
                input.read_exact(&mut contents)?;
                self.registry.get_mut(id)?.set_overlay(path, contents);
            }
            "LOCATE" => {
                let id = wire::read_number_field(input, "PROJECTID")?;
                let src = wire::read_field(input, "src")?;
                let line = wire::read_number_field(input, "row")? as u32;
                let column = wire::read_number_field(input, "column")? as u32;
                let _prefix = wire::read_field(input, "prefix")?;

                let project = self.registry.get_mut(id)?;
                let slot = match project.find_source(&src) {
                    Some(slot) => slot,
                    None => {
                        // Not a registered source; likely a header pulled in
                        // by some other translation unit. Adopt it.
                        debug!(%src, "unknown source in LOCATE, adding");
                        project.add_source(&self.parser, &src);
                        project.source_count() - 1
                    }
                };
                project.set_active(slot);
                locate::locate(&self.parser, project, line, column, output)?;
            }
            other => return Err(ProtocolError::UnknownSubcommand(other.to_string())),
        }
        wire::end_response(output)?;
        Ok(())
    }
}
