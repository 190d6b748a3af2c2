//! 可注入失败的 Mock substrate。
//!
//! # 典型用途
//! - 测试写入失败（如容量超限）时错误是否向上传播
//! - 测试读取 / 枚举失败时是否退化为未命中或空结果
//! - 检查 `remove_conversation` 等组合操作实际发出的底层调用

use crate::error::{Result, SubstrateError};
use crate::storage::substrate::{MemorySubstrate, Substrate};
use std::sync::Mutex;

/// 一次底层调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstrateCall {
    Get(String),
    Set(String),
    Remove(String),
    Keys,
}

#[derive(Default)]
struct FailureFlags {
    reads: bool,
    writes: bool,
    removes: bool,
    keys: bool,
}

/// 包装 [`MemorySubstrate`]，可按操作类型开启失败。
///
/// 失败的调用同样会被记录，且不会修改内部数据。
pub struct MockSubstrate {
    inner: MemorySubstrate,
    failures: Mutex<FailureFlags>,
    /// 每次调用按顺序记录
    calls: Mutex<Vec<SubstrateCall>>,
}

impl Default for MockSubstrate {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSubstrate {
    pub fn new() -> Self {
        Self::with_inner(MemorySubstrate::new())
    }

    /// 使用指定容量的内存 substrate
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_inner(MemorySubstrate::with_capacity(capacity))
    }

    fn with_inner(inner: MemorySubstrate) -> Self {
        Self {
            inner,
            failures: Mutex::new(FailureFlags::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.failures.lock().unwrap().reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.failures.lock().unwrap().writes = fail;
    }

    pub fn fail_removes(&self, fail: bool) {
        self.failures.lock().unwrap().removes = fail;
    }

    pub fn fail_keys(&self, fail: bool) {
        self.failures.lock().unwrap().keys = fail;
    }

    /// 已执行的调用总次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn set_calls(&self) -> usize {
        self.count_where(|c| matches!(c, SubstrateCall::Set(_)))
    }

    pub fn remove_calls(&self) -> usize {
        self.count_where(|c| matches!(c, SubstrateCall::Remove(_)))
    }

    /// 所有历史调用（按时序排列）
    pub fn all_calls(&self) -> Vec<SubstrateCall> {
        self.calls.lock().unwrap().clone()
    }

    /// 清空已记录的调用历史
    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn count_where(&self, pred: impl Fn(&SubstrateCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: SubstrateCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn injected(&self, op: &str) -> crate::error::StorageError {
        SubstrateError::Unavailable(format!("mock {op} failure")).into()
    }
}

impl Substrate for MockSubstrate {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.record(SubstrateCall::Get(key.to_string()));
        if self.failures.lock().unwrap().reads {
            return Err(self.injected("read"));
        }
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.record(SubstrateCall::Set(key.to_string()));
        if self.failures.lock().unwrap().writes {
            return Err(self.injected("write"));
        }
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.record(SubstrateCall::Remove(key.to_string()));
        if self.failures.lock().unwrap().removes {
            return Err(self.injected("remove"));
        }
        self.inner.remove_item(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.record(SubstrateCall::Keys);
        if self.failures.lock().unwrap().keys {
            return Err(self.injected("keys"));
        }
        self.inner.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_calls_in_order() {
        let substrate = MockSubstrate::new();
        substrate.set_item("a", "1").unwrap();
        substrate.get_item("a").unwrap();
        substrate.remove_item("a").unwrap();
        substrate.keys().unwrap();

        assert_eq!(
            substrate.all_calls(),
            vec![
                SubstrateCall::Set("a".into()),
                SubstrateCall::Get("a".into()),
                SubstrateCall::Remove("a".into()),
                SubstrateCall::Keys,
            ]
        );
        substrate.reset_calls();
        assert_eq!(substrate.call_count(), 0);
    }

    #[test]
    fn test_failed_write_leaves_data_untouched() {
        let substrate = MockSubstrate::new();
        substrate.set_item("a", "1").unwrap();

        substrate.fail_writes(true);
        assert!(substrate.set_item("a", "2").is_err());
        assert_eq!(substrate.get_item("a").unwrap().as_deref(), Some("1"));
        assert_eq!(substrate.set_calls(), 2);
    }

    #[test]
    fn test_capacity_is_forwarded() {
        let substrate = MockSubstrate::with_capacity(4);
        assert!(substrate.set_item("key", "value").unwrap_err().is_quota_exceeded());
    }
}
