//! Function declarations, namespace blocks and `return`.

use std::rc::Rc;

use hbl_ir::{
    namespace, Command, CommandData, Declared, FunctionClass, FunctionEntry, Opcode,
    ParameterKind, ReturnTarget,
};
use hbl_segment::{extract_conditions, scan};

use super::{Builder, Frame};
use crate::BuildError;

impl Builder<'_> {
    /// `function name(a, b&){body}`, also `ffunction` and `lfunction`.
    pub(super) fn build_function(
        &mut self,
        frame: &mut Frame,
        text: &str,
        class: FunctionClass,
    ) -> Result<(), BuildError> {
        if self.in_function {
            return Err(BuildError::NestedFunction);
        }

        let keyword_len = class.keyword().len();
        let Some(open) = text[keyword_len..].find('(').map(|at| at + keyword_len) else {
            return Err(BuildError::FunctionHeader(text.to_string()));
        };
        let name = text[keyword_len..open].trim();
        if name.is_empty() {
            return Err(BuildError::FunctionHeader(text.to_string()));
        }
        if !scan::is_valid_identifier(name, true) {
            return Err(BuildError::InvalidFunctionName(name.to_string()));
        }
        let qualified = frame.list.qualify(name);

        let arguments = extract_conditions(text, open + 1, ',', false);
        let body_open = arguments.close + 1;
        if text.as_bytes().get(body_open) != Some(&b'{')
            || !text.ends_with('}')
            || body_open + 1 >= text.len()
        {
            return Err(BuildError::MissingFunctionBody);
        }

        let extra = (class == FunctionClass::Local).then(|| self.registry.fresh_namespace());
        let mut parameters = Vec::with_capacity(arguments.len());
        let mut kinds = Vec::with_capacity(arguments.len());
        for argument in &arguments.pieces {
            let qualified = frame.list.qualify_with(argument.trim(), extra.as_deref());
            match qualified.strip_suffix('&') {
                Some(by_reference) => {
                    parameters.push(by_reference.to_string());
                    kinds.push(ParameterKind::Reference);
                }
                None => {
                    parameters.push(qualified);
                    kinds.push(ParameterKind::Value);
                }
            }
        }

        let body_source = &text[body_open + 1..text.len() - 1];
        let body_namespace = match &extra {
            Some(extra) => namespace::nest(frame.list.namespace(), Some(extra)),
            None => frame.list.namespace().map(str::to_string),
        };

        self.in_function = true;
        let built = self.build_frame(body_source, body_namespace);
        self.in_function = false;
        let mut body = built?.list;
        if extra.is_some() {
            body.set_enclosing_namespace(frame.list.namespace().map(str::to_string));
        }
        body.set_source_file(self.current_file().map(std::path::Path::to_path_buf));

        if self.registry.get_by_name(&qualified).is_some() {
            self.warn(format!("Overwritten previously defined function:'{qualified}'"));
        }
        let declared = self.registry.declare(FunctionEntry {
            name: qualified.clone(),
            body: Rc::new(body),
            parameters,
            kinds,
            class,
            source: text.to_string(),
        });
        tracing::debug!(
            function = %qualified,
            slot = declared.slot(),
            replaced = matches!(declared, Declared::Replaced(_)),
            "declared function"
        );
        Ok(())
    }

    /// `namespace name{body}`: compiled into its own list and run in place.
    pub(super) fn build_namespace(&mut self, frame: &mut Frame, text: &str) -> Result<(), BuildError> {
        let keyword_len = "namespace".len();
        let Some(open) = text[keyword_len..].find('{').map(|at| at + keyword_len) else {
            return Err(BuildError::FunctionHeader(text.to_string()));
        };
        let name = text[keyword_len..open].trim();
        if name.is_empty() {
            return Err(BuildError::FunctionHeader(text.to_string()));
        }
        if !scan::is_valid_identifier(name, true) {
            return Err(BuildError::InvalidFunctionName(name.to_string()));
        }
        if !text.ends_with('}') || text.len() < open + 2 {
            return Err(BuildError::MissingNamespaceBody);
        }

        let qualified = frame.list.qualify(name);
        let nested = self.build_frame(&text[open + 1..text.len() - 1], Some(qualified))?;
        frame
            .list
            .push(Command::new(Opcode::NestedList, text).with_list(Rc::new(nested.list)));
        Ok(())
    }

    /// `return`, `return expr`, `return(expr)`.
    pub(super) fn build_return(&mut self, frame: &mut Frame, text: &str) {
        let expression = text["return".len()..].trim_start().trim_end_matches(';');
        let target = if self.in_function {
            frame.returns.push(frame.list.len());
            // patched with the body length once the body is built
            ReturnTarget::Index(0)
        } else {
            ReturnTarget::Exit
        };

        let mut command = Command::new(Opcode::Return, text).with_data(CommandData::Return(target));
        if !expression.is_empty() {
            command = command.with_text(expression);
        }
        frame.list.push(command);
    }
}
