pub const COUNT_ELEMENTS: &str = r#"
() => {
    const count = (node) => {
        let total = 1;
        for (const child of node.children) total += count(child);
        return total;
    };
    return document.documentElement ? count(document.documentElement) : 0;
}
"#;

pub const INSTALL_CHANGE_OBSERVER: &str = r#"
(binding) => {
    const count = (node) => {
        let total = 1;
        for (const child of node.children) total += count(child);
        return total;
    };
    const total = () => document.documentElement ? count(document.documentElement) : 0;

    if (typeof MutationObserver === 'undefined' || typeof window[binding] !== 'function') {
        return { installed: false };
    }

    const key = '__settleObserver_' + binding;
    if (window[key]) window[key].disconnect();

    const observer = new MutationObserver(() => window[binding](String(total())));
    observer.observe(document, { attributes: true, characterData: true, childList: true, subtree: true });
    window[key] = observer;
    return { installed: true, count: total() };
}
"#;

pub const DISCONNECT_CHANGE_OBSERVER: &str = r#"
(binding) => {
    const key = '__settleObserver_' + binding;
    if (!window[key]) return { disconnected: false };
    window[key].disconnect();
    delete window[key];
    return { disconnected: true };
}
"#;
