use std::fmt::Write;

use crate::registers::Registers;

/// Register table, shown after a fault.
///
/// Minimal output is one `NAME value` pair per line, suited for blackbox tests.
pub fn registers(regs: &Registers, minimal: bool) -> String {
    let mut out = String::new();
    if minimal {
        for (i, val) in regs.iter().enumerate() {
            let _ = writeln!(out, "R{i} {}", val as i16);
        }
        let _ = writeln!(out, "PC {}", regs.pc());
        let _ = writeln!(out, "CC {}", regs.flag());
        return out;
    }

    out.push_str("\x1b[2m┌────────────────────────────────────┐\x1b[0m\n");
    out.push_str("\x1b[2m│        \x1b[3mhex     int    uint    char\x1b[0m\x1b[2m │\x1b[0m\n");
    for (i, val) in regs.iter().enumerate() {
        let _ = writeln!(
            out,
            "\x1b[2m│\x1b[0m \x1b[1mR{i}\x1b[0m  0x{val:04x}  {:-6}  {val:-6}  {} \x1b[2m│\x1b[0m",
            val as i16,
            char_display(val),
        );
    }
    let _ = writeln!(
        out,
        "\x1b[2m│\x1b[0m \x1b[1mPC\x1b[0m  0x{:04x}                 \x1b[1mCC\x1b[0m  {:03b} \x1b[2m│\x1b[0m",
        regs.pc(),
        regs.flag() as u8,
    );
    out.push_str("\x1b[2m└────────────────────────────────────┘\x1b[0m\n");
    out
}

/// Three column wide rendering of a character code.
fn char_display(val: u16) -> String {
    let shown = match val {
        0x00 => "NUL",
        0x08 => "BS ",
        0x09 => "HT ",
        0x0a => "LF ",
        0x0d => "CR ",
        0x1b => "ESC",
        0x7f => "DEL",
        0x20 => "[_]",
        0x21..=0x7e => return format!("   {}  ", val as u8 as char),
        0x00..=0x7f => "\x1b[2m───\x1b[0m",
        0x0080.. => "\x1b[2m┄┄┄\x1b[0m",
    };
    format!("   {shown}")
}
