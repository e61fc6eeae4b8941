use std::fmt;

/// 可克隆的已绑定调用，`Fn() + Clone` 的对象安全形式
trait Invoke {
    /// 执行绑定的函数
    fn invoke(&self);

    /// 复制出一份独立的调用（连同绑定参数）
    fn clone_boxed(&self) -> Box<dyn Invoke>;
}

impl<F> Invoke for F
where
    F: Fn() + Clone + 'static,
{
    fn invoke(&self) {
        self()
    }

    fn clone_boxed(&self) -> Box<dyn Invoke> {
        Box::new(self.clone())
    }
}

/// 任务：函数与其绑定参数打包成的零参数延迟调用
///
/// 参数在构造时按值捕获进闭包，此后不再变化；重复执行产生的副作用
/// 与直接重复调用被绑定的函数完全一致。克隆得到的任务与原任务互相
/// 独立，除非捕获的参数本身引用了外部共享状态（如 `Rc`）。
pub struct Task {
    payload: Option<Box<dyn Invoke>>,
}

impl Task {
    /// 由闭包创建任务
    ///
    /// 闭包类型不满足 `Fn() + Clone` 时在编译期拒绝，不存在
    /// 运行期的类型错误。
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() + Clone + 'static,
    {
        Self {
            payload: Some(Box::new(f)),
        }
    }

    /// 执行绑定的调用，可以重复执行
    ///
    /// # Panics
    ///
    /// 空任务（默认构造、或载荷已被 `mem::take` 取走）不允许执行，
    /// 这是调用方的编程错误。
    pub fn invoke(&self) {
        match &self.payload {
            Some(call) => call.invoke(),
            None => panic!("不允许执行空任务（默认构造或已被移动）"),
        }
    }

    /// 任务是否持有载荷
    pub fn is_armed(&self) -> bool {
        self.payload.is_some()
    }
}

impl Clone for Task {
    fn clone(&self) -> Self {
        Self {
            payload: self.payload.as_ref().map(|call| call.clone_boxed()),
        }
    }
}

impl Default for Task {
    /// 默认构造产生空任务，只能在赋予载荷后执行
    fn default() -> Self {
        Self { payload: None }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("armed", &self.is_armed())
            .finish()
    }
}
