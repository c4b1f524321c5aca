/// 检查 MSI 产品是否仍可枚举
pub fn msi_product_registered(product_code: &str) -> bool {
    #[cfg(windows)]
    {
        msi_product_registered_impl(product_code)
    }

    #[cfg(not(windows))]
    {
        let _ = product_code;
        false
    }
}

#[cfg(windows)]
fn msi_product_registered_impl(product_code: &str) -> bool {
    use std::process::Command;

    // 产品码只含 GUID 字符, 其他输入不进入查询
    let valid = product_code
        .chars()
        .all(|c| c.is_ascii_hexdigit() || matches!(c, '{' | '}' | '-'));
    if !valid || product_code.is_empty() {
        return false;
    }

    // 使用 PowerShell 按产品码查询 MSI 产品
    let output = Command::new("powershell")
        .args([
            "-NoProfile",
            "-Command",
            &format!(
                "Get-WmiObject -Class Win32_Product -Filter \"IdentifyingNumber='{}'\" | Select-Object -ExpandProperty IdentifyingNumber",
                product_code
            ),
        ])
        .output();

    match output {
        Ok(output) => {
            if output.status.success() {
                !String::from_utf8_lossy(&output.stdout).trim().is_empty()
            } else {
                tracing::warn!(
                    "查询 MSI 产品失败: {}",
                    String::from_utf8_lossy(&output.stderr)
                );
                false
            }
        }
        Err(e) => {
            tracing::warn!("执行 PowerShell 失败: {}", e);
            false
        }
    }
}
