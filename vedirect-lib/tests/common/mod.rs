#![allow(dead_code)]

use vedirect::text::ChecksumAccumulator;

/// Build a well-formed block from `fields`, ending with a valid checksum byte.
pub fn block(fields: &[(&str, &str)]) -> Vec<u8> {
    let mut dat = Vec::new();
    for (label, value) in fields {
        dat.extend_from_slice(b"\r\n");
        dat.extend_from_slice(label.as_bytes());
        dat.push(b'\t');
        dat.extend_from_slice(value.as_bytes());
    }
    dat.extend_from_slice(b"\r\nChecksum\t");
    let mut acc = ChecksumAccumulator::new();
    acc.extend(&dat);
    dat.push(acc.complement());
    dat
}

/// A valid single field block whose checksum byte is `checksum`.
pub fn block_with_checksum(checksum: u8) -> Vec<u8> {
    // three printable characters reach every residue modulo 256
    let chars: Vec<char> = ('!'..='~').collect();
    for a in &chars {
        for b in &chars {
            for c in &chars {
                let value: String = [*a, *b, *c].iter().collect();
                let dat = block(&[("V", &value)]);
                if dat.last() == Some(&checksum) {
                    return dat;
                }
            }
        }
    }
    panic!("no block found with checksum {checksum:#04x}");
}

/// A typical battery monitor block.
pub fn bmv_block() -> Vec<u8> {
    block(&[
        ("PID", "0x203"),
        ("V", "26201"),
        ("I", "0"),
        ("P", "0"),
        ("CE", "0"),
        ("SOC", "1000"),
        ("TTG", "-1"),
        ("Alarm", "OFF"),
        ("Relay", "OFF"),
        ("AR", "0"),
        ("BMV", "700"),
        ("FW", "0307"),
    ])
}

/// A typical solar charger block.
pub fn mppt_block() -> Vec<u8> {
    block(&[
        ("PID", "0xA053"),
        ("FW", "159"),
        ("SER#", "HQ2132QY2KR"),
        ("V", "13790"),
        ("I", "-10"),
        ("VPV", "15"),
        ("PPV", "0"),
        ("CS", "0"),
        ("MPPT", "0"),
        ("ERR", "0"),
        ("LOAD", "ON"),
        ("IL", "0"),
        ("H19", "3456"),
        ("H20", "0"),
        ("H21", "0"),
        ("H22", "2"),
        ("H23", "8"),
        ("HSDS", "263"),
    ])
}
