use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use playfs_vfs::{Errno, Fd, Fs, OpenFlags, Outcome, Syscall, Value, STDOUT};

/// Size of the buffer `cat` reads through.
const CHUNK: usize = 4096;

#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_help_flag = true)]
struct Line {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Open a file. FLAGS is any of r, w, +, c, t, a, x.
    Open {
        path: String,
        #[arg(short, long, default_value = "r")]
        flags: String,
    },
    Close {
        fd: Fd,
    },
    Read {
        fd: Fd,
        #[arg(default_value_t = CHUNK)]
        len: usize,
        #[arg(long)]
        at: Option<u64>,
    },
    Write {
        fd: Fd,
        text: Vec<String>,
    },
    Cat {
        path: String,
    },
    /// Write a line to the guest's standard output.
    Echo {
        text: Vec<String>,
    },
    Mkdir {
        path: String,
    },
    Ls {
        path: Option<String>,
    },
    Stat {
        path: String,
    },
    Fstat {
        fd: Fd,
    },
    Rm {
        path: String,
    },
    Cd {
        path: Option<String>,
    },
    Pwd,
    Rename {
        from: String,
        to: String,
    },
    Rmdir {
        path: String,
    },
    Truncate {
        path: String,
        len: u64,
    },
    Symlink {
        target: String,
        link: String,
    },
    Link {
        path: String,
        link: String,
    },
    Readlink {
        path: String,
    },
    /// Print the guest's user, group and process ids.
    Id,
    Groups,
    Umask {
        /// The new mask, in octal.
        #[arg(value_parser = parse_octal)]
        mask: u32,
    },
}

/// Runs console commands against a filesystem, one line at a time.
#[derive(Debug)]
pub struct Console {
    fs: Fs,
}

impl Console {
    pub fn new(fs: Fs) -> Self {
        Self { fs }
    }

    pub fn fs(&self) -> &Fs {
        &self.fs
    }

    pub fn into_inner(self) -> Fs {
        self.fs
    }

    /// Run a single command line, returning what it printed.
    pub fn execute(&mut self, input: &str) -> Result<Option<String>> {
        let words = split_words(input)?;
        if words.is_empty() {
            return Ok(None);
        }
        let line = Line::try_parse_from(words)?;
        self.run(line.cmd)
    }

    fn run(&mut self, cmd: Cmd) -> Result<Option<String>> {
        let value = match cmd {
            Cmd::Open { path, flags } => {
                let flags = parse_flags(&flags)?;
                check(self.fs.dispatch(Syscall::Open {
                    path: &path,
                    flags,
                    mode: 0o666,
                }))?
            }
            Cmd::Close { fd } => check(self.fs.dispatch(Syscall::Close { fd }))?,
            Cmd::Read { fd, len, at } => {
                let mut buf = vec![0; len];
                let value = check(self.fs.dispatch(Syscall::Read {
                    fd,
                    buf: &mut buf,
                    offset: 0,
                    length: len,
                    position: at,
                }))?;
                let Value::Count(n) = value else {
                    bail!("unexpected result from read: {value}");
                };
                return Ok(Some(String::from_utf8_lossy(&buf[..n]).into_owned()));
            }
            Cmd::Write { fd, text } => {
                let text = text.join(" ");
                check(self.fs.dispatch(Syscall::Write {
                    fd,
                    buf: text.as_bytes(),
                    offset: 0,
                    length: text.len(),
                    position: None,
                }))?
            }
            Cmd::Cat { path } => return self.cat(&path).map(Some),
            Cmd::Echo { text } => {
                let line = format!("{}\n", text.join(" "));
                check(self.fs.dispatch(Syscall::Write {
                    fd: STDOUT,
                    buf: line.as_bytes(),
                    offset: 0,
                    length: line.len(),
                    position: None,
                }))?;
                return Ok(None);
            }
            Cmd::Mkdir { path } => check(self.fs.dispatch(Syscall::Mkdir {
                path: &path,
                mode: 0o777,
            }))?,
            Cmd::Ls { path } => {
                let path = path.unwrap_or_else(|| ".".to_owned());
                let value = check(self.fs.dispatch(Syscall::Readdir { path: &path }))?;
                let Value::Names(names) = value else {
                    bail!("unexpected result from readdir: {value}");
                };
                return Ok(Some(names.iter().sorted().join("  ")));
            }
            Cmd::Stat { path } => check(self.fs.dispatch(Syscall::Stat { path: &path }))?,
            Cmd::Fstat { fd } => check(self.fs.dispatch(Syscall::Fstat { fd }))?,
            Cmd::Rm { path } => check(self.fs.dispatch(Syscall::Unlink { path: &path }))?,
            Cmd::Cd { path } => {
                let path = path.unwrap_or_else(|| self.fs.layout().home.clone());
                check(self.fs.dispatch(Syscall::Chdir { path: &path }))?;
                return Ok(None);
            }
            Cmd::Pwd => Value::Path(self.fs.cwd().to_owned()),
            Cmd::Rename { from, to } => check(self.fs.dispatch(Syscall::Rename {
                from: &from,
                to: &to,
            }))?,
            Cmd::Rmdir { path } => check(self.fs.dispatch(Syscall::Rmdir { path: &path }))?,
            Cmd::Truncate { path, len } => check(self.fs.dispatch(Syscall::Truncate {
                path: &path,
                len,
            }))?,
            Cmd::Symlink { target, link } => check(self.fs.dispatch(Syscall::Symlink {
                target: &target,
                link: &link,
            }))?,
            Cmd::Link { path, link } => check(self.fs.dispatch(Syscall::Link {
                path: &path,
                link: &link,
            }))?,
            Cmd::Readlink { path } => check(self.fs.dispatch(Syscall::Readlink { path: &path }))?,
            Cmd::Id => return self.id().map(Some),
            Cmd::Groups => check(self.fs.dispatch(Syscall::Getgroups))?,
            Cmd::Umask { mask } => check(self.fs.dispatch(Syscall::Umask { mask }))?,
        };

        Ok(match value {
            Value::Unit => None,
            Value::Fd(fd) => Some(fd.to_string()),
            value => Some(value.to_string()),
        })
    }

    fn id(&mut self) -> Result<String> {
        let calls = [
            ("uid", Syscall::Getuid),
            ("gid", Syscall::Getgid),
            ("euid", Syscall::Geteuid),
            ("egid", Syscall::Getegid),
            ("pid", Syscall::Getpid),
            ("ppid", Syscall::Getppid),
        ];
        let mut fields = vec![];
        for (name, call) in calls {
            let value = check(self.fs.dispatch(call))?;
            fields.push(format!("{name}={value}"));
        }
        Ok(fields.join(" "))
    }

    fn cat(&mut self, path: &str) -> Result<String> {
        let fd = match self.fs.dispatch(Syscall::Open {
            path,
            flags: OpenFlags::empty(),
            mode: 0,
        }) {
            Ok(Value::Fd(fd)) => fd,
            outcome => bail!("cannot open `{path}`: {}", describe(outcome)),
        };
        let mut contents = vec![];
        let mut buf = [0; CHUNK];
        let result = loop {
            match self.fs.dispatch(Syscall::Read {
                fd,
                buf: &mut buf,
                offset: 0,
                length: CHUNK,
                position: None,
            }) {
                Ok(Value::Count(0)) => break Ok(()),
                Ok(Value::Count(n)) => contents.extend_from_slice(&buf[..n]),
                outcome => break Err(anyhow!("cannot read `{path}`: {}", describe(outcome))),
            }
        };
        check(self.fs.dispatch(Syscall::Close { fd })).context("error closing file")?;
        result?;

        let mut contents = String::from_utf8_lossy(&contents).into_owned();
        if contents.ends_with('\n') {
            contents.pop();
        }
        Ok(contents)
    }
}

fn check(outcome: Outcome) -> Result<Value> {
    outcome.map_err(errno_error)
}

fn errno_error(errno: Errno) -> anyhow::Error {
    anyhow!("{errno} ({})", errno.code())
}

fn describe(outcome: Outcome) -> String {
    match outcome {
        Ok(value) => format!("unexpected result `{value}`"),
        Err(errno) => errno_error(errno).to_string(),
    }
}

fn parse_octal(s: &str) -> Result<u32, std::num::ParseIntError> {
    u32::from_str_radix(s, 8)
}

fn parse_flags(letters: &str) -> Result<OpenFlags> {
    letters.chars().try_fold(OpenFlags::empty(), |flags, c| {
        let flag = match c {
            'r' => OpenFlags::empty(),
            'w' => OpenFlags::WRONLY,
            '+' => OpenFlags::RDWR,
            'c' => OpenFlags::CREATE,
            't' => OpenFlags::TRUNC,
            'a' => OpenFlags::APPEND,
            'x' => OpenFlags::EXCL,
            c => bail!("unknown open flag `{c}`"),
        };
        Ok(flags | flag)
    })
}

/// Split a command line into words. Double quotes group words and understand `\n`, `\t`, `\"` and
/// `\\` escapes.
fn split_words(input: &str) -> Result<Vec<String>> {
    let mut words = vec![];
    let mut current: Option<String> = None;
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                let word = current.get_or_insert_with(String::new);
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => word.push(match chars.next() {
                            Some('n') => '\n',
                            Some('t') => '\t',
                            Some(c @ ('"' | '\\')) => c,
                            Some(c) => bail!("unknown escape `\\{c}`"),
                            None => bail!("unterminated escape"),
                        }),
                        Some(c) => word.push(c),
                        None => bail!("unterminated string"),
                    }
                }
            }
            c if c.is_whitespace() => words.extend(current.take()),
            c => current.get_or_insert_with(String::new).push(c),
        }
    }
    words.extend(current);
    Ok(words)
}
