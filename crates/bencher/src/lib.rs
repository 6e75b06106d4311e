//! Shared fixtures of the micro-stomp benchmarks.

#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    file: TestFile,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, file: TestFile) -> Self {
        Self { name, group, file }
    }

    pub fn small(name: &'static str, file: TestFile) -> Self {
        Self::new(name, TestGroup::Small, file)
    }

    pub fn large(name: &'static str, file: TestFile) -> Self {
        Self::new(name, TestGroup::Large, file)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn file(&self) -> &TestFile {
        &self.file
    }
}

/// A wire fixture: one complete frame, NUL terminator included.
#[derive(Debug, Copy, Clone)]
pub struct TestFile {
    file_name: &'static str,
    content: &'static str,
}

impl TestFile {
    pub const fn new(file_name: &'static str, content: &'static str) -> Self {
        Self { file_name, content }
    }

    pub fn content(&self) -> &'static str {
        self.content
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Large,
}

/// A pair of `heart-beat` values as advertised in CONNECT and CONNECTED.
#[derive(Debug, Copy, Clone)]
pub struct NegotiationCase {
    name: &'static str,
    client: &'static str,
    server: &'static str,
}

impl NegotiationCase {
    pub const fn new(name: &'static str, client: &'static str, server: &'static str) -> Self {
        Self { name, client, server }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn client(&self) -> &'static str {
        self.client
    }

    pub fn server(&self) -> &'static str {
        self.server
    }
}
