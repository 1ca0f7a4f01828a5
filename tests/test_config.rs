use std::ffi::{c_char, CStr};
use std::io::Write;

use tempfile::NamedTempFile;
use typthon_bind::dispatch::{self, CallbackMode};
use typthon_bind::objects::{PyObject, Scope};
use typthon_bind::transforms::{strings, Native, OverflowPolicy, Str};
use typthon_bind::{apply, BindConfig, BindError, ModuleBuilder};

extern "C" fn byte_len(text: *const c_char) -> usize {
    unsafe { CStr::from_ptr(text) }.to_bytes().len()
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_file_drives_module_init() {
    let file = write_config(
        r#"
        [strings]
        encoding = "gb18030"
        overflow = "truncate"

        [callbacks]
        mode = "direct"
        autostart_dispatcher = false
        "#,
    );
    let config = BindConfig::from_file(file.path()).unwrap();
    assert_eq!(config.strings.overflow, OverflowPolicy::Truncate);
    assert!(!config.callbacks.autostart_dispatcher);

    let mut builder = ModuleBuilder::new("quotes").with_config(config).unwrap();
    builder.def(
        "byte_len",
        apply::<(Str<0>,), _>(Native::new(byte_len as extern "C" fn(*const c_char) -> usize)),
    );
    let module = builder.finish().unwrap();

    assert_eq!(strings::active_codec().encoding_name(), "gb18030");
    assert_eq!(dispatch::default_mode(), CallbackMode::Direct);

    let len = module.get_attr("byte_len").unwrap();
    assert_eq!(len.call(&[PyObject::str("上海")]).unwrap(), PyObject::Int(4));
    assert_eq!(len.call(&[PyObject::str("abc")]).unwrap(), PyObject::Int(3));
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = BindConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, BindError::Config { .. }));
}

#[test]
fn test_invalid_file_contents() {
    let file = write_config("[strings]\nencoding = \"klingon\"\n");
    assert_eq!(
        BindConfig::from_file(file.path()).unwrap_err(),
        BindError::UnknownEncoding { label: "klingon".into() }
    );

    let file = write_config("[callbacks]\nmode = 3\n");
    assert!(matches!(
        BindConfig::from_file(file.path()),
        Err(BindError::Config { .. })
    ));
}
