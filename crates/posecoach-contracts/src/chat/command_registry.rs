#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose whole remainder is one raw value, stored under the given key.
pub(crate) const RAW_ARG_COMMANDS: &[(CommandSpec, &str)] = &[
    (
        CommandSpec {
            command: "gender",
            action: "set_gender",
        },
        "gender",
    ),
    (
        CommandSpec {
            command: "style",
            action: "set_style",
        },
        "style",
    ),
    (
        CommandSpec {
            command: "delete",
            action: "delete_image",
        },
        "id",
    ),
];

/// Capture commands. The path is optional and replaces the active camera.
pub(crate) const CAPTURE_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "analyze",
        action: "analyze",
    },
    CommandSpec {
        command: "grade",
        action: "grade",
    },
    CommandSpec {
        command: "save",
        action: "save",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "camera",
        action: "set_camera",
    },
    CommandSpec {
        command: "ghost",
        action: "ghost",
    },
    CommandSpec {
        command: "export",
        action: "export_gallery",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "wait",
        action: "wait",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "reset",
        action: "reset",
    },
    CommandSpec {
        command: "gallery",
        action: "list_gallery",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const SESSION_HELP_COMMANDS: &[&str] = &[
    "/camera",
    "/analyze",
    "/grade",
    "/save",
    "/wait",
    "/status",
    "/reset",
    "/gender",
    "/style",
    "/gallery",
    "/delete",
    "/ghost",
    "/export",
    "/help",
    "/quit",
];
