#![no_main]
use libfuzzer_sys::fuzz_target;
use webfx_modgraph::module::validation::DescriptorValidator;
use webfx_modgraph::ModuleDescriptor;

fuzz_target!(|data: &[u8]| {
    // Descriptors come from disk and from downloaded artifacts: parsing must
    // fail with a structured error, never panic
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let Ok(descriptor) = ModuleDescriptor::from_toml_str(text) else {
        return;
    };

    let name = descriptor.name.clone().unwrap_or_else(|| "fuzzed".to_string());
    let _ = DescriptorValidator::new().validate(&name, &descriptor);
    let _ = descriptor.target_for(&name);
    let _ = descriptor.snapshot_entries(&name);

    // Rewriting a parsed descriptor must not panic either
    if let Ok(serialized) = descriptor.to_toml_string() {
        let _ = ModuleDescriptor::from_toml_str(&serialized);
    }
});
