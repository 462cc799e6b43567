//! Built-in command name sets used by the shell classifier.
//!
//! Names are matched against the lowercased first word of a pipeline segment.
//! Operators extend both sets through `blocked_actions` in the config.

/// Commands that only inspect state when used without write-like arguments.
pub const READ_ONLY_COMMANDS: &[&str] = &[
    // file reading
    "cat", "less", "more", "head", "tail", "wc", "nl", "tac", "rev",
    // search
    "grep", "egrep", "fgrep", "rg", "ripgrep", "ag", "ack",
    // text processing
    "sort", "uniq", "cut", "paste", "join", "comm", "column", "tr", "expand", "unexpand",
    "fold", "fmt", "pr", "shuf", "tsort",
    // comparison
    "diff", "cmp", "sdiff", "vimdiff",
    // checksums
    "md5sum", "sha1sum", "sha256sum", "sha512sum", "cksum", "sum",
    // binary inspection
    "od", "hexdump", "xxd", "strings", "file", "readelf", "objdump", "nm",
    // filesystem inspection
    "ls", "dir", "vdir", "pwd", "which", "type", "whereis", "locate", "find", "basename",
    "dirname", "readlink", "realpath", "stat",
    // user and system info
    "whoami", "id", "groups", "users", "who", "w", "last", "lastlog", "hostname", "uname",
    "arch", "lsb_release", "hostnamectl", "date", "cal", "uptime", "df", "du", "free",
    "vmstat", "iostat",
    // processes
    "ps", "pgrep", "pidof", "top", "htop", "iotop", "atop", "lsof", "jobs", "pstree", "fuser",
    // network
    "netstat", "ss", "ip", "ifconfig", "route", "arp", "ping", "traceroute", "tracepath",
    "mtr", "nslookup", "dig", "host", "whois",
    // environment
    "printenv", "env", "set", "export", "alias", "history", "fc",
    // output
    "echo", "printf", "yes", "seq", "jot",
    // tests
    "test", "[", "[[", "true", "false",
    // calculation
    "bc", "dc", "expr", "factor", "units",
    // structured data and modern replacements
    "jq", "yq", "xmlstarlet", "xmllint", "xsltproc", "bat", "fd", "fzf", "tree", "ncdu",
    "exa", "lsd", "tldr", "cheat",
    // code search
    "ast-grep", "sg", "ast_grep",
    // argument-checked editors
    "awk", "sed", "gawk", "mawk", "gsed",
];

/// Commands that write, delete, install, or escalate.
pub const MUTATING_COMMANDS: &[&str] = &[
    // file operations
    "rm", "rmdir", "unlink", "shred", "mv", "rename", "cp", "install", "dd", "mkdir", "mkfifo",
    "mknod", "mktemp", "touch", "truncate",
    // permissions and links
    "chmod", "chown", "chgrp", "umask", "ln", "link", "symlink", "setfacl", "setfattr",
    "chattr",
    // system management
    "useradd", "userdel", "usermod", "groupadd", "groupdel", "passwd", "chpasswd",
    "systemctl", "service",
    // package managers
    "apt", "apt-get", "dpkg", "snap", "yum", "dnf", "rpm", "pip", "pip3", "npm", "yarn",
    "gem", "cargo",
    // build tools
    "make", "cmake", "ninja", "meson",
    // escalation, scheduling, signals
    "sudo", "doas", "su", "crontab", "at", "batch", "kill", "pkill", "killall", "tee",
];

/// Read-only `pip`/`pip3` subcommands.
pub const PIP_READ_SUBCOMMANDS: &[&str] = &["show", "list", "search", "check", "freeze", "help"];

/// Read-only `npm`/`yarn` subcommands.
pub const NPM_READ_SUBCOMMANDS: &[&str] = &["list", "ls", "view", "show", "search", "help"];

/// Read-only `git` subcommands. `branch` and `remote` are further restricted
/// to their listing forms by the classifier.
pub const GIT_READ_SUBCOMMANDS: &[&str] = &[
    "status", "log", "diff", "show", "branch", "blame", "rev-parse", "describe", "remote",
    "ls-files", "ls-tree", "cat-file", "shortlog", "grep",
];

/// Interpreters that can rewrite files from an inline script.
pub const INTERPRETERS: &[&str] = &["python", "python3", "node", "perl", "ruby", "sh", "bash"];

pub fn contains(set: &[&str], name: &str) -> bool {
    set.contains(&name)
}
