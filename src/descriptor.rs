//! Creation descriptors and their serialization into `bcreate` arguments.
//!
//! Every attribute is declared once in the `descriptor!` table below. The
//! table yields the struct (JSON keys equal the field names) and the ordered
//! list of CBSD jconf keys used when building the argument vector, so the
//! two can never drift apart.

use serde::{Deserialize, Deserializer, Serialize};

macro_rules! descriptor {
    ($($field:ident),+ $(,)?) => {
        /// Sparse set of `bcreate` attributes. An empty string means absent.
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct CreateDescriptor {
            $(
                #[serde(
                    deserialize_with = "null_as_empty",
                    skip_serializing_if = "String::is_empty"
                )]
                pub $field: String,
            )+
        }

        impl CreateDescriptor {
            /// Every attribute as `(jconf key, value)`, in declaration order,
            /// absent ones included.
            pub fn attributes(&self) -> impl Iterator<Item = (&'static str, &str)> {
                [$((stringify!($field), self.$field.as_str())),+].into_iter()
            }
        }
    };
}

descriptor! {
    jname,
    xhci,
    astart,
    relative_path,
    path,
    data,
    rcconf,
    host_hostname,
    ip4_addr,
    nic_hwaddr,
    zfs_snapsrc,
    runasap,
    interface,
    rctl_nice,
    emulator,
    imgsize,
    imgtype,
    vm_cpus,
    vm_ram,
    vm_os_type,
    vm_efi,
    iso_site,
    iso_img,
    register_iso_name,
    register_iso_as,
    vm_hostbridge,
    bhyve_flags,
    virtio_type,
    vm_os_profile,
    swapsize,
    vm_iso_path,
    vm_guestfs,
    vm_vnc_port,
    bhyve_generate_acpi,
    bhyve_wire_memory,
    bhyve_rts_keeps_utc,
    bhyve_force_msi_irq,
    bhyve_x2apic_mode,
    bhyve_mptable_gen,
    bhyve_ignore_msr_acc,
    cd_vnc_wait,
    bhyve_vnc_resolution,
    bhyve_vnc_tcp_bind,
    bhyve_vnc_vgaconf,
    nic_driver,
    vnc_password,
    media_auto_eject,
    vm_cpu_topology,
    debug_engine,
    cd_boot_firmware,
    jailed,
    on_poweroff,
    on_reboot,
    on_crash,
}

/// JSON `null` counts as absent, same as a missing key.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl CreateDescriptor {
    /// Force the VM name to the one taken from the request path.
    pub fn with_name(mut self, name: &str) -> Self {
        self.jname = name.to_string();
        self
    }

    /// `key=value` tokens for every present attribute, in declaration order.
    pub fn to_args(&self) -> Vec<String> {
        self.attributes()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| format!("{key}={value}"))
            .collect()
    }
}
