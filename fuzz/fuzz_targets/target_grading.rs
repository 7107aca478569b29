#![no_main]
use libfuzzer_sys::fuzz_target;
use webfx_modgraph::{Target, TargetTag};

fn target_from(bits: u16) -> Target {
    TargetTag::ALL
        .iter()
        .enumerate()
        .filter(|(i, _)| bits & (1 << i) != 0)
        .map(|(_, tag)| *tag)
        .collect()
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let module = target_from(u16::from_le_bytes([data[0], data[1]]));
    let required = target_from(u16::from_le_bytes([data[2], data[3]]));

    let grade = module.grade(&required);
    // A universal module runs anywhere
    if module.is_universal() {
        assert_eq!(grade, 0);
    }
    // A tagged module is compatible exactly when one of its tags is implied
    if !module.is_universal() {
        assert_eq!(grade >= 0, module.tags().any(|tag| required.satisfies(tag)));
    }

    if data.len() > 4 {
        let name = String::from_utf8_lossy(&data[4..]);
        let _ = Target::from_module_name(&name).grade(&required);
    }
});
