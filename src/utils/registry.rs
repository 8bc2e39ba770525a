// src/utils/registry.rs

use crate::{
    accessor::{SettingValue, ValueKind},
    errors::SettingError,
};

/// Root keys a setting path may start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hive {
    LocalMachine,
    CurrentUser,
    ClassesRoot,
    Users,
    CurrentConfig,
}

/// Parses the full registry path into hive and subkey path.
///
/// Accepts both long (`HKEY_LOCAL_MACHINE`) and short (`HKLM`) hive names.
pub fn parse_registry_path(path: &str) -> Result<(Hive, String), SettingError> {
    let (root, subkey) = path.split_once('\\').ok_or_else(|| {
        SettingError::InvalidPath(format!(
            "'{}'. Expected format 'HKEY_*\\Subkey\\...'",
            path
        ))
    })?;
    let hive = match root.to_uppercase().as_str() {
        "HKEY_LOCAL_MACHINE" | "HKLM" => Hive::LocalMachine,
        "HKEY_CURRENT_USER" | "HKCU" => Hive::CurrentUser,
        "HKEY_CLASSES_ROOT" | "HKCR" => Hive::ClassesRoot,
        "HKEY_USERS" | "HKU" => Hive::Users,
        "HKEY_CURRENT_CONFIG" | "HKCC" => Hive::CurrentConfig,
        other => {
            return Err(SettingError::InvalidPath(format!(
                "unsupported registry hive '{}'",
                other
            )))
        }
    };
    let subkey = subkey.trim_matches('\\');
    if subkey.is_empty() {
        return Err(SettingError::InvalidPath(format!("'{}' has no subkey", path)));
    }
    Ok((hive, subkey.to_string()))
}

fn utf16_bytes(s: &str) -> impl Iterator<Item = u8> + '_ {
    s.encode_utf16().flat_map(|c| c.to_le_bytes())
}

/// Raw registry bytes for `value`, strings NUL-terminated.
pub fn encode_value(value: &SettingValue) -> Vec<u8> {
    match value {
        SettingValue::Dword(v) => v.to_le_bytes().to_vec(),
        SettingValue::Qword(v) => v.to_le_bytes().to_vec(),
        SettingValue::String(s) | SettingValue::ExpandString(s) => {
            utf16_bytes(s).chain([0, 0]).collect()
        }
        SettingValue::MultiString(items) => {
            let mut bytes = Vec::new();
            for item in items {
                bytes.extend(utf16_bytes(item));
                bytes.extend([0, 0]);
            }
            bytes.extend([0, 0]);
            bytes
        }
        SettingValue::Binary(data) => data.clone(),
    }
}

/// Decodes raw registry bytes of type `kind`.
pub fn decode_value(kind: ValueKind, bytes: &[u8]) -> Result<SettingValue, SettingError> {
    let wide = || -> Vec<u16> {
        bytes
            .chunks_exact(2)
            .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
            .collect()
    };
    let text = |units: &[u16]| {
        let end = units.iter().position(|&c| c == 0).unwrap_or(units.len());
        String::from_utf16_lossy(&units[..end])
    };

    Ok(match kind {
        ValueKind::Dword => {
            let raw: [u8; 4] = bytes
                .get(..4)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| SettingError::InvalidValue("REG_DWORD data too small".into()))?;
            SettingValue::Dword(u32::from_le_bytes(raw))
        }
        ValueKind::Qword => {
            let raw: [u8; 8] = bytes
                .get(..8)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| SettingError::InvalidValue("REG_QWORD data too small".into()))?;
            SettingValue::Qword(u64::from_le_bytes(raw))
        }
        ValueKind::String => SettingValue::String(text(&wide())),
        ValueKind::ExpandString => SettingValue::ExpandString(text(&wide())),
        ValueKind::MultiString => {
            let units = wide();
            let mut items: Vec<String> = units
                .split(|&c| c == 0)
                .map(String::from_utf16_lossy)
                .collect();
            while items.last().is_some_and(String::is_empty) {
                items.pop();
            }
            SettingValue::MultiString(items)
        }
        ValueKind::Binary => SettingValue::Binary(bytes.to_vec()),
    })
}

#[cfg(windows)]
pub use self::native::RegistryAccessor;

#[cfg(windows)]
mod native {
    use std::io;

    use tracing::debug;
    use winreg::{
        enums::{
            RegType, HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER,
            HKEY_LOCAL_MACHINE, HKEY_USERS, KEY_READ, KEY_SET_VALUE,
        },
        RegKey, RegValue,
    };

    use super::{decode_value, encode_value, parse_registry_path, Hive};
    use crate::{
        accessor::{InterfaceEnumerator, SettingAccessor, SettingPath, SettingValue, ValueKind},
        constants::{NETWORK_CLASS_PATH, NET_CFG_INSTANCE_ID},
        errors::SettingError,
    };

    fn predef(hive: Hive) -> RegKey {
        RegKey::predef(match hive {
            Hive::LocalMachine => HKEY_LOCAL_MACHINE,
            Hive::CurrentUser => HKEY_CURRENT_USER,
            Hive::ClassesRoot => HKEY_CLASSES_ROOT,
            Hive::Users => HKEY_USERS,
            Hive::CurrentConfig => HKEY_CURRENT_CONFIG,
        })
    }

    fn to_reg_type(kind: ValueKind) -> RegType {
        match kind {
            ValueKind::Dword => RegType::REG_DWORD,
            ValueKind::Qword => RegType::REG_QWORD,
            ValueKind::String => RegType::REG_SZ,
            ValueKind::ExpandString => RegType::REG_EXPAND_SZ,
            ValueKind::MultiString => RegType::REG_MULTI_SZ,
            ValueKind::Binary => RegType::REG_BINARY,
        }
    }

    fn from_reg_type(vtype: &RegType) -> Option<ValueKind> {
        match vtype {
            RegType::REG_DWORD => Some(ValueKind::Dword),
            RegType::REG_QWORD => Some(ValueKind::Qword),
            RegType::REG_SZ => Some(ValueKind::String),
            RegType::REG_EXPAND_SZ => Some(ValueKind::ExpandString),
            RegType::REG_MULTI_SZ => Some(ValueKind::MultiString),
            RegType::REG_BINARY => Some(ValueKind::Binary),
            _ => None,
        }
    }

    fn open(namespace: &str, flags: u32) -> Result<RegKey, SettingError> {
        let (hive, subkey) = parse_registry_path(namespace)?;
        predef(hive)
            .open_subkey_with_flags(&subkey, flags)
            .map_err(|e| SettingError::from_io(format!("registry key '{}'", namespace), e))
    }

    /// Registry values through `winreg`.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct RegistryAccessor;

    impl RegistryAccessor {
        pub fn new() -> Self {
            Self
        }
    }

    impl SettingAccessor for RegistryAccessor {
        fn read(&self, path: &SettingPath) -> Result<Option<SettingValue>, SettingError> {
            let key = match open(&path.namespace, KEY_READ) {
                Ok(key) => key,
                Err(e) if e.is_not_found() => return Ok(None),
                Err(e) => return Err(e),
            };

            let raw = match key.get_raw_value(&path.name) {
                Ok(raw) => raw,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(SettingError::from_io(path.to_string(), e)),
            };

            let kind = from_reg_type(&raw.vtype).ok_or_else(|| {
                SettingError::Unsupported(format!("type {:?} of '{}'", raw.vtype, path))
            })?;
            decode_value(kind, &raw.bytes).map(Some)
        }

        fn write(&self, path: &SettingPath, value: &SettingValue) -> Result<(), SettingError> {
            let (hive, subkey) = parse_registry_path(&path.namespace)?;
            // create_subkey creates all intermediate subkeys if they don't exist
            let (key, _) = predef(hive).create_subkey(&subkey).map_err(|e| {
                SettingError::from_io(format!("registry key '{}'", path.namespace), e)
            })?;

            let raw = RegValue {
                bytes: encode_value(value),
                vtype: to_reg_type(value.kind()),
            };
            key.set_raw_value(&path.name, &raw)
                .map_err(|e| SettingError::from_io(path.to_string(), e))
        }

        fn delete(&self, path: &SettingPath) -> Result<(), SettingError> {
            let key = match open(&path.namespace, KEY_SET_VALUE) {
                Ok(key) => key,
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
            };
            match key.delete_value(&path.name) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(SettingError::from_io(path.to_string(), e)),
            }
        }
    }

    impl InterfaceEnumerator for RegistryAccessor {
        fn interface_ids(&self) -> Result<Vec<String>, SettingError> {
            let class = open(NETWORK_CLASS_PATH, KEY_READ)?;
            let mut ids = Vec::new();

            for name in class.enum_keys() {
                let name = match name {
                    Ok(name) => name,
                    Err(e) => {
                        debug!("Skipping unreadable adapter subkey: {}", e);
                        continue;
                    }
                };
                // Not every subkey is an adapter ("Properties" is access-protected).
                let id = class
                    .open_subkey_with_flags(&name, KEY_READ)
                    .and_then(|adapter| adapter.get_value::<String, _>(NET_CFG_INSTANCE_ID));
                match id {
                    Ok(id) => ids.push(id),
                    Err(e) => debug!("Adapter subkey '{}' has no {}: {}", name, NET_CFG_INSTANCE_ID, e),
                }
            }
            Ok(ids)
        }
    }

    #[cfg(test)]
    mod tests {
        use std::sync::Mutex;

        use super::*;

        static TEST_MUTEX: Mutex<()> = Mutex::new(());

        const TEST_PATH: &str = "HKEY_CURRENT_USER\\Software\\PerfToolTest";

        #[test]
        #[ignore = "writes to HKCU"]
        fn write_read_delete_every_kind() {
            let _lock = TEST_MUTEX.lock().unwrap();
            let registry = RegistryAccessor::new();

            let values = [
                SettingValue::Dword(42),
                SettingValue::Qword(1 << 40),
                SettingValue::String("hello".into()),
                SettingValue::ExpandString("%TEMP%\\x".into()),
                SettingValue::MultiString(vec!["a".into(), "b".into()]),
                SettingValue::Binary(vec![0xDE, 0xAD, 0xBE, 0xEF]),
            ];
            for (i, value) in values.iter().enumerate() {
                let path = SettingPath::new(TEST_PATH, format!("Value{}", i));
                registry.write(&path, value).unwrap();
                assert_eq!(registry.read(&path).unwrap().as_ref(), Some(value));
                registry.delete(&path).unwrap();
                assert_eq!(registry.read(&path).unwrap(), None);
                // Deleting twice is fine.
                registry.delete(&path).unwrap();
            }
        }

        #[test]
        fn missing_key_reads_as_absent() {
            let _lock = TEST_MUTEX.lock().unwrap();
            let path = SettingPath::new("HKCU\\Software\\PerfToolTest\\DoesNotExist", "Nope");
            assert_eq!(RegistryAccessor::new().read(&path).unwrap(), None);
            RegistryAccessor::new().delete(&path).unwrap();
        }

        #[test]
        #[ignore = "reads the live adapter list"]
        fn lists_network_interfaces() {
            let ids = RegistryAccessor::new().interface_ids().unwrap();
            println!("Interfaces: {:?}", ids);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hives() {
        assert_eq!(
            parse_registry_path("HKEY_LOCAL_MACHINE\\SYSTEM\\CurrentControlSet").unwrap(),
            (Hive::LocalMachine, "SYSTEM\\CurrentControlSet".to_string())
        );
        assert_eq!(
            parse_registry_path("hkcu\\Software").unwrap(),
            (Hive::CurrentUser, "Software".to_string())
        );
    }

    #[test]
    fn test_invalid_registry_path() {
        let invalid_paths = [
            "",
            "INVALID_HIVE\\Software",
            "HKEY_UNKNOWN\\Software",
            "HKEY_CURRENT_USER", // Missing subkey
            "HKEY_CURRENT_USER\\",
        ];

        for path in invalid_paths {
            let result = parse_registry_path(path);
            assert!(
                matches!(result, Err(SettingError::InvalidPath(_))),
                "Path '{}' should be invalid",
                path
            );
        }
    }

    #[test]
    fn strings_are_nul_terminated_utf16() {
        let bytes = encode_value(&SettingValue::String("ab".into()));
        assert_eq!(bytes, [b'a', 0, b'b', 0, 0, 0]);
        assert_eq!(
            decode_value(ValueKind::String, &bytes).unwrap(),
            SettingValue::String("ab".into())
        );
    }

    #[test]
    fn multi_string_layout() {
        let value = SettingValue::MultiString(vec!["a".into(), "bc".into()]);
        let bytes = encode_value(&value);
        assert_eq!(bytes, [b'a', 0, 0, 0, b'b', 0, b'c', 0, 0, 0, 0, 0]);
        assert_eq!(decode_value(ValueKind::MultiString, &bytes).unwrap(), value);
        assert_eq!(
            decode_value(ValueKind::MultiString, &[0, 0]).unwrap(),
            SettingValue::MultiString(vec![])
        );
    }

    #[test]
    fn short_numeric_data_is_rejected() {
        assert!(matches!(
            decode_value(ValueKind::Dword, &[1, 0]),
            Err(SettingError::InvalidValue(_))
        ));
        assert_eq!(
            decode_value(ValueKind::Qword, &7u64.to_le_bytes()).unwrap(),
            SettingValue::Qword(7)
        );
    }
}
