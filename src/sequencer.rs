//! Tag-length-value command table interpreter.
//!
//! A table is a flat byte sequence of records:
//!
//! ```text
//! +---------+--------+---------------------+
//! | command | length | length × parameter  |
//! +---------+--------+---------------------+
//! ```
//!
//! There is no terminator and no checksum; the table ends where its bytes
//! end. Consuming one record advances exactly `2 + length` bytes, so a
//! record whose length byte disagrees with its real parameter count shifts
//! every record after it. [`CommandTable::new`] catches the detectable case
//! (a record running past the end) once, up front.
//!
//! The sequencer knows nothing about buses or GPIO lines. Playback goes
//! through a [`CommandSink`], or through a pair of closures with [`play`].
//!
//! ```
//! use st7789_dma::sequencer::{play, CommandTable};
//!
//! let table = CommandTable::new(&[0x11, 0x00, 0x3A, 0x01, 0x05]).unwrap();
//! let mut commands = [0u8; 2];
//! let mut params = [0u8; 1];
//! let (mut nc, mut np) = (0, 0);
//! let consumed = play::<core::convert::Infallible>(
//!     &table,
//!     |c| { commands[nc] = c; nc += 1; Ok(()) },
//!     |p| { params[np] = p; np += 1; Ok(()) },
//! )
//! .unwrap();
//! assert_eq!(commands, [0x11, 0x3A]);
//! assert_eq!(params, [0x05]);
//! assert_eq!(consumed, 5);
//! ```

/// A table that cannot be played back as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TableError {
    /// The last record has a command byte but no length byte.
    MissingLength {
        /// Byte offset of the record.
        offset: usize,
        /// Its command byte.
        command: u8,
    },
    /// A record declares more parameters than the table has bytes left.
    Truncated {
        /// Byte offset of the record.
        offset: usize,
        /// Its command byte.
        command: u8,
        /// Declared parameter count.
        declared: u8,
        /// Parameter bytes actually present.
        available: usize,
    },
}

impl core::fmt::Display for TableError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingLength { offset, command } => write!(
                f,
                "command {command:#04x} at offset {offset} has no length byte"
            ),
            Self::Truncated {
                offset,
                command,
                declared,
                available,
            } => write!(
                f,
                "command {command:#04x} at offset {offset} declares {declared} parameters \
                 but only {available} remain"
            ),
        }
    }
}

impl core::error::Error for TableError {}

/// One decoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command<'a> {
    /// Command byte, sent with the D/C line low.
    pub opcode: u8,
    /// Parameter bytes, sent with the D/C line high.
    pub params: &'a [u8],
}

impl Command<'_> {
    /// Bytes this record occupies in a well-formed table.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        2 + self.params.len()
    }
}

/// An immutable command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandTable<'a> {
    bytes: &'a [u8],
}

impl<'a> CommandTable<'a> {
    /// Check that every record fits inside `bytes`.
    ///
    /// Usable in const context, so a static table can be validated at
    /// compile time.
    ///
    /// # Errors
    /// [`TableError`] describing the first record that runs past the end.
    pub const fn new(bytes: &'a [u8]) -> Result<Self, TableError> {
        let mut offset = 0;
        while offset < bytes.len() {
            let command = bytes[offset];
            if offset + 1 >= bytes.len() {
                return Err(TableError::MissingLength { offset, command });
            }
            let declared = bytes[offset + 1];
            let available = bytes.len() - offset - 2;
            if declared as usize > available {
                return Err(TableError::Truncated {
                    offset,
                    command,
                    declared,
                    available,
                });
            }
            offset += 2 + declared as usize;
        }
        Ok(Self { bytes })
    }

    /// Wrap `bytes` without validation.
    ///
    /// Iteration is still bounded by the table length: a record running past
    /// the end yields only the parameter bytes that exist.
    #[must_use]
    pub const fn new_unchecked(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Raw table bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Table length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `true` for a table with no records.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Iterate over the records front to back. Every call starts over.
    #[must_use]
    pub const fn iter(&self) -> Commands<'a> {
        Commands {
            bytes: self.bytes,
            offset: 0,
        }
    }

    /// First record with the given command byte.
    #[must_use]
    pub fn find(&self, opcode: u8) -> Option<Command<'a>> {
        self.iter().find(|command| command.opcode == opcode)
    }
}

impl<'a> IntoIterator for CommandTable<'a> {
    type Item = Command<'a>;
    type IntoIter = Commands<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &CommandTable<'a> {
    type Item = Command<'a>;
    type IntoIter = Commands<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over a [`CommandTable`].
#[derive(Debug, Clone)]
pub struct Commands<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl Commands<'_> {
    /// Table bytes consumed so far.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.offset.min(self.bytes.len())
    }
}

impl<'a> Iterator for Commands<'a> {
    type Item = Command<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.bytes;
        let opcode = *bytes.get(self.offset)?;
        let declared = bytes.get(self.offset + 1).copied().unwrap_or(0) as usize;
        let start = (self.offset + 2).min(bytes.len());
        let end = (start + declared).min(bytes.len());
        self.offset += 2 + declared;
        Some(Command {
            opcode,
            params: &bytes[start..end],
        })
    }
}

impl core::iter::FusedIterator for Commands<'_> {}

/// Receiver for a table playback.
pub trait CommandSink {
    /// Error raised by the underlying transport.
    type Error;

    /// Emit a command byte.
    ///
    /// # Errors
    /// Transport specific.
    fn write_command(&mut self, opcode: u8) -> Result<(), Self::Error>;

    /// Emit one parameter byte of the current command.
    ///
    /// # Errors
    /// Transport specific.
    fn write_parameter(&mut self, param: u8) -> Result<(), Self::Error>;
}

impl<T: CommandSink + ?Sized> CommandSink for &mut T {
    type Error = T::Error;

    fn write_command(&mut self, opcode: u8) -> Result<(), Self::Error> {
        T::write_command(self, opcode)
    }

    fn write_parameter(&mut self, param: u8) -> Result<(), Self::Error> {
        T::write_parameter(self, param)
    }
}

/// Play `table` into `sink`, returning the number of table bytes consumed.
///
/// For every record the command byte goes to
/// [`CommandSink::write_command`], then each parameter byte, in table order,
/// to [`CommandSink::write_parameter`]. The first sink error stops playback.
///
/// # Errors
/// Whatever the sink returns.
pub fn play_into<S: CommandSink>(table: &CommandTable<'_>, mut sink: S) -> Result<usize, S::Error> {
    let mut commands = table.iter();
    for command in commands.by_ref() {
        sink.write_command(command.opcode)?;
        for &param in command.params {
            sink.write_parameter(param)?;
        }
    }
    Ok(commands.consumed())
}

struct FnSink<C, P> {
    command: C,
    parameter: P,
}

impl<C, P, E> CommandSink for FnSink<C, P>
where
    C: FnMut(u8) -> Result<(), E>,
    P: FnMut(u8) -> Result<(), E>,
{
    type Error = E;

    fn write_command(&mut self, opcode: u8) -> Result<(), E> {
        (self.command)(opcode)
    }

    fn write_parameter(&mut self, param: u8) -> Result<(), E> {
        (self.parameter)(param)
    }
}

/// Play `table` through a pair of callbacks. See [`play_into`].
///
/// # Errors
/// The first error returned by either callback.
pub fn play<E>(
    table: &CommandTable<'_>,
    write_command: impl FnMut(u8) -> Result<(), E>,
    write_parameter: impl FnMut(u8) -> Result<(), E>,
) -> Result<usize, E> {
    play_into(
        table,
        FnSink {
            command: write_command,
            parameter: write_parameter,
        },
    )
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::cell::RefCell;
    use core::convert::Infallible;
    use std::vec;
    use std::vec::Vec;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Command(u8),
        Parameter(u8),
    }

    fn record(table: &CommandTable<'_>) -> (Vec<Call>, usize) {
        let calls = RefCell::new(Vec::new());
        let consumed = play::<Infallible>(
            table,
            |c| {
                calls.borrow_mut().push(Call::Command(c));
                Ok(())
            },
            |p| {
                calls.borrow_mut().push(Call::Parameter(p));
                Ok(())
            },
        )
        .unwrap();
        (calls.into_inner(), consumed)
    }

    #[test]
    fn test_play_order() {
        let table = CommandTable::new(&[0x11, 0x00, 0x3A, 0x01, 0x05]).unwrap();

        let (calls, consumed) = record(&table);

        assert_eq!(
            calls,
            [Call::Command(0x11), Call::Command(0x3A), Call::Parameter(0x05)]
        );
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_parameters_in_table_order() {
        let table = CommandTable::new(&[0x2A, 0x04, 0x00, 0x00, 0x00, 0xEF, 0x2C, 0x00]).unwrap();

        let (calls, _) = record(&table);

        assert_eq!(
            calls,
            [
                Call::Command(0x2A),
                Call::Parameter(0x00),
                Call::Parameter(0x00),
                Call::Parameter(0x00),
                Call::Parameter(0xEF),
                Call::Command(0x2C),
            ]
        );
    }

    #[test]
    fn test_consumed_bytes_cover_table() {
        let bytes = [
            0x11, 0x00, //
            0xB2, 0x05, 0x0C, 0x0C, 0x00, 0x33, 0x33, //
            0xD0, 0x02, 0xA4, 0xA1, //
            0x29, 0x00,
        ];
        let table = CommandTable::new(&bytes).unwrap();

        let total: usize = table.iter().map(|c| c.encoded_len()).sum();
        assert_eq!(total, bytes.len());
        assert_eq!(table.iter().count(), 4);

        let (_, consumed) = record(&table);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_empty_table() {
        let table = CommandTable::new(&[]).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.iter().next(), None);
        assert_eq!(record(&table), (vec![], 0));
    }

    #[test]
    fn test_iteration_is_restartable() {
        let table = CommandTable::new(&[0x01, 0x00, 0x02, 0x01, 0x07]).unwrap();
        let first: Vec<_> = table.iter().collect();
        let second: Vec<_> = (&table).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(
            first,
            [
                Command {
                    opcode: 0x01,
                    params: &[]
                },
                Command {
                    opcode: 0x02,
                    params: &[0x07]
                },
            ]
        );
    }

    #[test]
    fn test_new_rejects_truncated_record() {
        let err = CommandTable::new(&[0x11, 0x00, 0x2A, 0x04, 0x00, 0x00]).unwrap_err();
        assert_eq!(
            err,
            TableError::Truncated {
                offset: 2,
                command: 0x2A,
                declared: 4,
                available: 2
            }
        );
    }

    #[test]
    fn test_new_rejects_missing_length() {
        let err = CommandTable::new(&[0x11, 0x00, 0x29]).unwrap_err();
        assert_eq!(
            err,
            TableError::MissingLength {
                offset: 2,
                command: 0x29
            }
        );
    }

    #[test]
    fn test_unchecked_table_desynchronizes_silently() {
        // 0x3A claims two parameters but only has one, so 0x29 is eaten as a
        // parameter and 0x00 is read as the next command.
        let table = CommandTable::new_unchecked(&[0x3A, 0x02, 0x05, 0x29, 0x00]);

        let (calls, consumed) = record(&table);

        assert_eq!(
            calls,
            [
                Call::Command(0x3A),
                Call::Parameter(0x05),
                Call::Parameter(0x29),
                Call::Command(0x00),
            ]
        );
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_unchecked_truncated_record_is_clamped() {
        let table = CommandTable::new_unchecked(&[0x2A, 0x04, 0x00]);
        let commands: Vec<_> = table.iter().collect();
        assert_eq!(
            commands,
            [Command {
                opcode: 0x2A,
                params: &[0x00]
            }]
        );
    }

    #[test]
    fn test_find() {
        let table = CommandTable::new(&[0x11, 0x00, 0x3A, 0x01, 0x05]).unwrap();
        assert_eq!(table.find(0x3A).unwrap().params, [0x05]);
        assert!(table.find(0x2A).is_none());
    }

    #[test]
    fn test_sink_error_stops_playback() {
        struct FailOnSecondCommand {
            commands: usize,
            params: usize,
        }

        impl CommandSink for FailOnSecondCommand {
            type Error = &'static str;

            fn write_command(&mut self, _opcode: u8) -> Result<(), Self::Error> {
                self.commands += 1;
                if self.commands == 2 {
                    Err("bus stuck")
                } else {
                    Ok(())
                }
            }

            fn write_parameter(&mut self, _param: u8) -> Result<(), Self::Error> {
                self.params += 1;
                Ok(())
            }
        }

        let table = CommandTable::new(&[0x36, 0x01, 0x00, 0x3A, 0x01, 0x05, 0x29, 0x00]).unwrap();
        let mut sink = FailOnSecondCommand {
            commands: 0,
            params: 0,
        };

        assert_eq!(play_into(&table, &mut sink), Err("bus stuck"));
        assert_eq!(sink.commands, 2);
        assert_eq!(sink.params, 1);
    }

    #[test]
    fn test_const_validation() {
        const TABLE: CommandTable<'static> = match CommandTable::new(&[0x29, 0x00]) {
            Ok(table) => table,
            Err(_) => panic!("invalid table"),
        };
        assert_eq!(TABLE.len(), 2);
    }

    #[test]
    fn test_error_display() {
        let err = TableError::Truncated {
            offset: 2,
            command: 0x2A,
            declared: 4,
            available: 2,
        };
        assert_eq!(
            std::format!("{err}"),
            "command 0x2a at offset 2 declares 4 parameters but only 2 remain"
        );
    }
}
