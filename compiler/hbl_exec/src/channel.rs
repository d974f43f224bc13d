//! Routing of execution errors.

use hbl_formula::{Value, VariableTable};
use hbl_ir::{ErrorMode, InstructionList};

use crate::globals::{EXECUTION_ERROR_HANDLING, LAST_EXECUTION_ERROR};
use crate::ExecError;

/// Where an execution error raised by a command goes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorChannel {
    /// The run stops and the error reaches the top-level boundary.
    Fatal,
    /// The message lands in `LAST_EXECUTION_ERROR`; execution continues.
    Soft,
}

impl ErrorChannel {
    /// The channel in force for commands of `list`.
    ///
    /// A numeric `HBL_EXECUTION_ERROR_HANDLING` overrides the list's mode.
    pub fn for_list(variables: &VariableTable, list: &InstructionList) -> ErrorChannel {
        match variables.get_by_name(EXECUTION_ERROR_HANDLING) {
            Value::Number(n) if *n != 0.0 => ErrorChannel::Soft,
            Value::Number(_) => ErrorChannel::Fatal,
            _ => match list.error_mode() {
                ErrorMode::Soft => ErrorChannel::Soft,
                ErrorMode::Abort => ErrorChannel::Fatal,
            },
        }
    }

    /// Deliver `error`. Soft routing consumes it and returns `Ok`; fatal
    /// routing hands it back.
    ///
    /// Soft messages accumulate newline-separated while the list's error
    /// flag stays raised; the first one after a reset overwrites.
    pub fn route(
        self,
        variables: &mut VariableTable,
        list: &InstructionList,
        error: ExecError,
    ) -> Result<(), ExecError> {
        match self {
            ErrorChannel::Fatal => Err(error),
            ErrorChannel::Soft => {
                let message = error.to_string();
                let text = match variables.get_by_name(LAST_EXECUTION_ERROR) {
                    Value::Str(previous) if list.error_flag() => format!("{previous}\n{message}"),
                    _ => message,
                };
                variables.set_by_name(LAST_EXECUTION_ERROR, Value::from(text));
                list.set_error_flag(true);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_list_mode_decides_without_override() {
        let vars = VariableTable::new();
        let list = InstructionList::new("", None);
        assert_eq!(ErrorChannel::for_list(&vars, &list), ErrorChannel::Fatal);
        list.set_error_mode(ErrorMode::Soft);
        assert_eq!(ErrorChannel::for_list(&vars, &list), ErrorChannel::Soft);
    }

    #[test]
    fn test_global_override() {
        let mut vars = VariableTable::new();
        let list = InstructionList::new("", None);
        vars.set_by_name(EXECUTION_ERROR_HANDLING, Value::Number(1.0));
        assert_eq!(ErrorChannel::for_list(&vars, &list), ErrorChannel::Soft);

        list.set_error_mode(ErrorMode::Soft);
        vars.set_by_name(EXECUTION_ERROR_HANDLING, Value::Number(0.0));
        assert_eq!(ErrorChannel::for_list(&vars, &list), ErrorChannel::Fatal);
    }

    #[test]
    fn test_soft_messages_accumulate() {
        let mut vars = VariableTable::new();
        let list = InstructionList::new("", None);
        let soft = ErrorChannel::Soft;
        assert!(soft.route(&mut vars, &list, ExecError::message("first")).is_ok());
        assert!(soft.route(&mut vars, &list, ExecError::message("second")).is_ok());
        assert_eq!(vars.get_by_name(LAST_EXECUTION_ERROR), &Value::from("first\nsecond"));

        list.set_error_flag(false);
        assert!(soft.route(&mut vars, &list, ExecError::message("third")).is_ok());
        assert_eq!(vars.get_by_name(LAST_EXECUTION_ERROR), &Value::from("third"));
    }

    #[test]
    fn test_fatal_hands_error_back() {
        let mut vars = VariableTable::new();
        let list = InstructionList::new("", None);
        let err = ErrorChannel::Fatal.route(&mut vars, &list, ExecError::message("stop"));
        assert!(matches!(err, Err(ExecError::Message(m)) if m == "stop"));
        assert!(!list.error_flag());
    }
}
