//! The FRR control-plane daemon set run inside each router.
//!
//! Four independent long-lived daemons per router, launched in a fixed
//! order: zebra (the base routing-table/interface manager) must be
//! reachable before the protocol daemons try to register routes with it.
//! Each daemon binds its management VTY to loopback, reads the router's
//! generated `frr.conf`, and detaches (`-d`).

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Installation directory of the FRR daemon binaries.
pub const FRR_BIN_DIR: &str = "/usr/lib/frr";

/// Loopback management address every daemon's VTY binds to.
pub const MGMT_ADDR: &str = "127.0.0.1";

/// Socket send-buffer size handed to zebra.
const ZEBRA_SEND_BUF: &str = "90000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Daemon {
    /// Base routing-table and interface manager.
    Zebra,
    /// Static-route daemon.
    Staticd,
    /// Link-state (OSPF) routing daemon.
    Ospfd,
    /// Border-gateway (BGP) daemon.
    Bgpd,
}

impl Daemon {
    /// All daemons, in launch order.
    pub const ALL: [Daemon; 4] = [Daemon::Zebra, Daemon::Staticd, Daemon::Ospfd, Daemon::Bgpd];

    /// Process name, as it appears in `/proc/<pid>/comm`.
    pub fn process_name(self) -> &'static str {
        match self {
            Daemon::Zebra => "zebra",
            Daemon::Staticd => "staticd",
            Daemon::Ospfd => "ospfd",
            Daemon::Bgpd => "bgpd",
        }
    }

    pub fn binary(self) -> PathBuf {
        Path::new(FRR_BIN_DIR).join(self.process_name())
    }

    /// Whether this daemon is the base manager the others depend on.
    pub fn is_base_manager(self) -> bool {
        matches!(self, Daemon::Zebra)
    }

    /// Launch arguments: loopback VTY, the router's generated config,
    /// pid file and zebra API socket in the context's private run dir,
    /// detached.
    pub fn args(self, config_dir: &Path, run_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-A".into(),
            MGMT_ADDR.into(),
            "-f".into(),
            config_dir.join("frr.conf").into(),
            "-i".into(),
            run_dir.join(format!("{}.pid", self.process_name())).into(),
            "-z".into(),
            zserv_socket(run_dir).into(),
        ];
        if self.is_base_manager() {
            args.push("-s".into());
            args.push(ZEBRA_SEND_BUF.into());
        }
        args.push("-d".into());
        args
    }
}

/// Path of zebra's API socket inside a context's run dir. The protocol
/// daemons connect here; its existence is the readiness signal for the
/// base manager.
pub fn zserv_socket(run_dir: &Path) -> PathBuf {
    run_dir.join("zserv.api")
}
