use super::models::RemovalEntry;
use super::{msi, registry};

/// 启动前的目标存在性验证能力
///
/// 监管者只通过该接口确认目标仍然存在, 便于测试替换实现。
pub trait PresenceProbe: Send + Sync {
    /// 卸载注册表项是否仍然存在
    fn still_registered(&self) -> bool;

    /// MSI 产品是否仍可枚举
    fn provider_still_enumerable(&self) -> bool;
}

/// 基于注册表与 MSI 枚举的默认实现
pub struct RegistryProbe {
    registry_key: Option<String>,
    product_code: Option<String>,
}

impl RegistryProbe {
    pub fn from_entry(entry: &RemovalEntry) -> Self {
        Self {
            registry_key: entry.registry_key.clone(),
            product_code: entry.product_code.clone(),
        }
    }
}

impl PresenceProbe for RegistryProbe {
    fn still_registered(&self) -> bool {
        match &self.registry_key {
            Some(path) => registry::uninstall_key_exists(path),
            // 没有注册表项可验证时视为仍然存在
            None => true,
        }
    }

    fn provider_still_enumerable(&self) -> bool {
        match &self.product_code {
            Some(code) => msi::msi_product_registered(code),
            None => false,
        }
    }
}
