//! hmr-spec Parser
//!
//! Turns spec text into a [`Document`]. The pest grammar classifies each
//! line; the builder below tracks which section (file block or expectations)
//! and which condition block a line belongs to.

use pest::{error::InputLocation, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::errors::{
    to_source_span, ErrorKind, ErrorReporting, ReportContext, SourceContext, SpecError,
};
use crate::syntax::{ConditionalText, Document, FileBlock, Label, Part, Span, SubMarker};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct SpecParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse spec text into a document.
pub fn parse(source_text: &str, source: &SourceContext) -> Result<Document, SpecError> {
    let ctx = ReportContext::new(source.clone(), "parse");
    let mut pairs = SpecParser::parse(Rule::spec, source_text)
        .map_err(|e| convert_parse_error(e, &ctx))?;

    let Some(spec) = pairs.next() else {
        return Ok(Document::default());
    };

    let mut builder = DocumentBuilder::new(&ctx);
    for pair in spec.into_inner() {
        match pair.as_rule() {
            Rule::line => builder.line(pair)?,
            Rule::EOI => {}
            rule => {
                return Err(ctx.unexpected_token(
                    "a spec line",
                    &format!("{:?}", rule),
                    to_source_span(get_span(&pair)),
                ))
            }
        }
    }
    builder.finish()
}

/// Parse a spec used as a whole test: the `# <title>` line is mandatory.
pub fn parse_test(source_text: &str, source: &SourceContext) -> Result<Document, SpecError> {
    let document = parse(source_text, source)?;
    if document.title.is_none() {
        let ctx = ReportContext::new(source.clone(), "parse");
        return Err(ctx
            .report(ErrorKind::MissingTitle, (0..0).into())
            .with_help("start the spec with a '# <title>' line"));
    }
    Ok(document)
}

// ============================================================================
// DOCUMENT BUILDER
// ============================================================================

enum Segment {
    Text(String),
    Sub(usize),
}

#[derive(Debug)]
enum Section {
    Preamble,
    File { path: String, span: Span },
    Expectations,
}

/// Text accumulated for an unconditional run or an open condition block.
struct Buffer {
    text: String,
    subs: Vec<SubMarker>,
    span: Span,
}

impl Buffer {
    fn new(span: Span) -> Self {
        Self {
            text: String::new(),
            subs: Vec::new(),
            span,
        }
    }

    fn append(&mut self, segments: Vec<Segment>, span: Span) {
        for segment in segments {
            match segment {
                Segment::Text(text) => self.text.push_str(&text),
                Segment::Sub(slot) => self.subs.push(SubMarker {
                    slot,
                    offset: self.text.len(),
                }),
            }
        }
        self.text.push('\n');
        self.span = self.span.join(span);
    }
}

struct OpenBlock {
    label: Label,
    description: Option<String>,
    buffer: Buffer,
}

struct DocumentBuilder<'c> {
    ctx: &'c ReportContext,
    document: Document,
    section: Section,
    content: ConditionalText,
    run: Option<Buffer>,
    block: Option<OpenBlock>,
    seen_content: bool,
}

impl<'c> DocumentBuilder<'c> {
    fn new(ctx: &'c ReportContext) -> Self {
        Self {
            ctx,
            document: Document::default(),
            section: Section::Preamble,
            content: ConditionalText::default(),
            run: None,
            block: None,
            seen_content: false,
        }
    }

    fn line(&mut self, line: Pair<Rule>) -> Result<(), SpecError> {
        let span = get_span(&line);
        let raw = line.as_str();
        let blank = raw.trim().is_empty();

        let mut inner = line.into_inner();
        let indent = inner.next().map(|p| p.as_str()).unwrap_or_default();
        let directive = inner.next();

        if self.block.is_some() {
            if matches!(directive.as_ref().map(|d| d.as_rule()), Some(Rule::block_close)) {
                return self.close_block();
            }
            let segments = self.reparse(raw, span)?;
            if let Some(block) = self.block.as_mut() {
                block.buffer.append(segments, span);
            }
            return Ok(());
        }

        let Some(directive) = directive else {
            return self.text(indent, Vec::new(), blank, span);
        };

        match directive.as_rule() {
            Rule::file_open => {
                let path = directive
                    .into_inner()
                    .next()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                self.finish_section()?;
                self.section = Section::File { path, span };
            }
            Rule::divider => {
                if matches!(self.section, Section::Expectations) {
                    return Err(self
                        .ctx
                        .malformed_delimiter(raw, to_source_span(span))
                        .with_help("a spec has a single '****' divider"));
                }
                self.finish_section()?;
                self.section = Section::Expectations;
            }
            Rule::block_open => {
                self.flush_run()?;
                self.require_section(raw, span)?;
                let mut inner = directive.into_inner();
                let label = Label::new(inner.next().map(|p| p.as_str()).unwrap_or_default());
                let description = inner
                    .next()
                    .map(|p| p.as_str().trim().to_string())
                    .filter(|d| !d.is_empty());
                self.block = Some(OpenBlock {
                    label,
                    description,
                    buffer: Buffer::new(span),
                });
            }
            Rule::block_close => {
                return Err(self
                    .ctx
                    .malformed_delimiter(raw, to_source_span(span))
                    .with_help("no condition block is open"));
            }
            Rule::condition => {
                self.flush_run()?;
                self.require_section(raw, span)?;
                let mut inner = directive.into_inner();
                let label = Label::new(inner.next().map(|p| p.as_str()).unwrap_or_default());
                let mut buffer = Buffer::new(span);
                if let Some(text) = inner.next() {
                    let segments = self.segments(text)?;
                    if !segments.is_empty() {
                        buffer.append(segments, span);
                    }
                }
                self.push_conditional(label, buffer, false, None)?;
            }
            Rule::bad_condition | Rule::bad_file_open => {
                return Err(self.ctx.malformed_delimiter(raw, to_source_span(span)));
            }
            Rule::title => {
                let is_title = !self.seen_content
                    && matches!(self.section, Section::Preamble)
                    && self.document.title.is_none();
                if is_title {
                    let title = directive
                        .into_inner()
                        .next()
                        .map(|p| p.as_str().trim().to_string())
                        .unwrap_or_default();
                    self.document.title = Some(title);
                    self.seen_content = true;
                } else {
                    let segments = self.reparse(raw, span)?;
                    self.text("", segments, false, span)?;
                }
            }
            Rule::text => {
                let segments = self.segments(directive)?;
                self.text(indent, segments, blank, span)?;
            }
            rule => {
                return Err(self.ctx.unexpected_token(
                    "a spec line",
                    &format!("{:?}", rule),
                    to_source_span(span),
                ))
            }
        }

        if !blank {
            self.seen_content = true;
        }
        Ok(())
    }

    fn text(
        &mut self,
        indent: &str,
        segments: Vec<Segment>,
        blank: bool,
        span: Span,
    ) -> Result<(), SpecError> {
        if matches!(self.section, Section::Preamble) {
            if blank {
                return Ok(());
            }
            return Err(self.ctx.unexpected_token(
                "'---- <path> ----' or '****'",
                "text",
                to_source_span(span),
            ));
        }
        let run = self.run.get_or_insert_with(|| Buffer::new(span));
        run.text.push_str(indent);
        run.append(segments, span);
        Ok(())
    }

    fn require_section(&self, raw: &str, span: Span) -> Result<(), SpecError> {
        if matches!(self.section, Section::Preamble) {
            return Err(self
                .ctx
                .unexpected_token("'---- <path> ----' or '****'", raw.trim(), to_source_span(span)));
        }
        Ok(())
    }

    fn close_block(&mut self) -> Result<(), SpecError> {
        let Some(block) = self.block.take() else {
            return Ok(());
        };
        self.push_conditional(block.label, block.buffer, true, block.description)
    }

    fn push_conditional(
        &mut self,
        label: Label,
        buffer: Buffer,
        block: bool,
        description: Option<String>,
    ) -> Result<(), SpecError> {
        if let (Section::File { path, .. }, Some(marker)) = (&self.section, buffer.subs.first()) {
            return Err(self.ctx.report(
                ErrorKind::SubInFileContent {
                    path: path.clone(),
                    slot: marker.slot,
                },
                to_source_span(buffer.span),
            ));
        }
        self.content.push(Part {
            condition: Some(label),
            text: buffer.text,
            block: Some(block),
            subs: buffer.subs,
            description,
            span: buffer.span,
        });
        Ok(())
    }

    fn flush_run(&mut self) -> Result<(), SpecError> {
        let Some(run) = self.run.take() else {
            return Ok(());
        };
        if let Some(marker) = run.subs.first() {
            let span = to_source_span(run.span);
            return Err(match &self.section {
                Section::File { path, .. } => self.ctx.report(
                    ErrorKind::SubInFileContent {
                        path: path.clone(),
                        slot: marker.slot,
                    },
                    span,
                ),
                _ => self.ctx.sub_outside_condition(marker.slot, span),
            });
        }
        self.content.push(Part::unconditional(run.text, run.span));
        Ok(())
    }

    fn finish_section(&mut self) -> Result<(), SpecError> {
        if let Some(block) = &self.block {
            return Err(self
                .ctx
                .unexpected_token(
                    "'::' closing the condition block",
                    "end of section",
                    to_source_span(block.buffer.span),
                )
                .with_help(format!("close the '::{}::' block with a '::' line", block.label)));
        }
        self.flush_run()?;
        let mut content = std::mem::take(&mut self.content);
        trim_blank_edges(&mut content);
        match std::mem::replace(&mut self.section, Section::Preamble) {
            Section::Preamble => {}
            Section::File { path, span } => self.document.files.push(FileBlock {
                path,
                content,
                span,
            }),
            Section::Expectations => self.document.expectations = Some(content),
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Document, SpecError> {
        self.finish_section()?;
        Ok(self.document)
    }

    fn segments(&self, text: Pair<Rule>) -> Result<Vec<Segment>, SpecError> {
        let mut segments = Vec::new();
        for piece in text.into_inner() {
            match piece.as_rule() {
                Rule::chunk => segments.push(Segment::Text(piece.as_str().to_string())),
                Rule::sub_marker => {
                    let span = get_span(&piece);
                    let digits = piece
                        .into_inner()
                        .next()
                        .map(|p| p.as_str())
                        .unwrap_or_default();
                    let slot = digits.parse::<usize>().map_err(|_| {
                        self.ctx
                            .unexpected_token("a sub-procedure slot", digits, to_source_span(span))
                    })?;
                    segments.push(Segment::Sub(slot));
                }
                _ => {}
            }
        }
        Ok(segments)
    }

    /// Re-read a whole line as plain text.
    fn reparse(&self, raw: &str, span: Span) -> Result<Vec<Segment>, SpecError> {
        let mut pairs = SpecParser::parse(Rule::raw_line, raw).map_err(|e| {
            let mut err = convert_parse_error(e, self.ctx);
            err.source_info.primary_span = to_source_span(span);
            err
        })?;
        let Some(text) = pairs.next().and_then(|line| line.into_inner().next()) else {
            return Ok(Vec::new());
        };
        self.segments(text)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Drop blank lines at the very start and end of a section.
fn trim_blank_edges(content: &mut ConditionalText) {
    if let Some(first) = content.parts.first_mut() {
        if !first.is_conditional() {
            first.text = strip_leading_blank_lines(&first.text);
        }
    }
    if let Some(last) = content.parts.last_mut() {
        if !last.is_conditional() {
            last.text = strip_trailing_blank_lines(&last.text);
        }
    }
    content
        .parts
        .retain(|part| part.is_conditional() || !part.text.is_empty());
}

fn strip_leading_blank_lines(text: &str) -> String {
    let mut rest = text;
    while let Some(pos) = rest.find('\n') {
        if !rest[..pos].trim().is_empty() {
            break;
        }
        rest = &rest[pos + 1..];
    }
    if rest.trim().is_empty() {
        return String::new();
    }
    rest.to_string()
}

fn strip_trailing_blank_lines(text: &str) -> String {
    let mut lines: Vec<&str> = text.split_inclusive('\n').collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    lines.concat()
}

fn get_span(pair: &Pair<Rule>) -> Span {
    let span = pair.as_span();
    Span {
        start: span.start(),
        end: span.end(),
    }
}

fn convert_parse_error(error: pest::error::Error<Rule>, ctx: &ReportContext) -> SpecError {
    let span = match error.location {
        InputLocation::Pos(pos) => pos..pos,
        InputLocation::Span((start, end)) => start..end,
    };
    ctx.unexpected_token("a spec line", &error.variant.message(), span.into())
}
