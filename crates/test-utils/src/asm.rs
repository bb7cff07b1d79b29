//! A small label-aware EVM assembler for writing fixture contracts by hand.
use std::collections::HashMap;

use revm::bytecode::opcode::{JUMPDEST, PUSH0, PUSH1, PUSH2};

#[derive(Debug, Default, Clone)]
pub struct Assembler {
    code: Vec<u8>,
    labels: HashMap<&'static str, usize>,
    fixups: Vec<(usize, &'static str)>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn op(&mut self, opcode: u8) -> &mut Self {
        self.code.push(opcode);
        self
    }

    /// Pushes `value` with the shortest push instruction (`PUSH0` for zero).
    pub fn push_u64(&mut self, value: u64) -> &mut Self {
        let bytes = value.to_be_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        self.push_bytes(&bytes[first..])
    }

    pub fn push_usize(&mut self, value: usize) -> &mut Self {
        self.push_u64(value as u64)
    }

    /// Pushes up to 32 bytes as a single big-endian word.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        assert!(bytes.len() <= 32, "cannot push {} bytes", bytes.len());
        if bytes.is_empty() {
            return self.op(PUSH0);
        }
        self.code.push(PUSH1 + (bytes.len() as u8 - 1));
        self.code.extend_from_slice(bytes);
        self
    }

    /// Pushes the offset of `label`, resolved when assembling.
    pub fn push_label(&mut self, label: &'static str) -> &mut Self {
        self.code.push(PUSH2);
        self.fixups.push((self.code.len(), label));
        self.code.extend_from_slice(&[0, 0]);
        self
    }

    /// Defines `label` as a jump target.
    pub fn jumpdest(&mut self, label: &'static str) -> &mut Self {
        self.mark(label);
        self.op(JUMPDEST)
    }

    /// Defines `label` at the current offset without emitting anything.
    pub fn mark(&mut self, label: &'static str) -> &mut Self {
        let previous = self.labels.insert(label, self.code.len());
        assert!(previous.is_none(), "label {label} defined twice");
        self
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self
    }

    /// Resolves label references and returns the bytecode.
    ///
    /// Panics on undefined labels or offsets beyond `PUSH2` range.
    pub fn assemble(&self) -> Vec<u8> {
        let mut code = self.code.clone();
        for (position, label) in &self.fixups {
            let offset = *self
                .labels
                .get(label)
                .unwrap_or_else(|| panic!("undefined label {label}"));
            let offset = u16::try_from(offset)
                .unwrap_or_else(|_| panic!("label {label} at {offset} is out of PUSH2 range"));
            code[*position..*position + 2].copy_from_slice(&offset.to_be_bytes());
        }
        code
    }
}
